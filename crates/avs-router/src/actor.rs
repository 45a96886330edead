//! Router actor
//!
//! Driver I/O is blocking, so the actor hands each command to the blocking
//! pool and awaits it before taking the next one. Commands therefore complete
//! in arrival order, and a selection never interleaves with another.
//! Events are best effort: when the event queue is full they are dropped
//! with a warning, and the requester still gets its reply.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use avs_router::{Router, RouterHandle};
//!
//! let router = Arc::new(Router::load(&path)?);
//! let (handle, mut events, task) = RouterHandle::spawn(router);
//!
//! handle.select(0).await?;
//! handle.shutdown().await?;
//! task.await?;
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RouterError;
use crate::events::RouterEvent;
use crate::router::Router;

/// Queue depth for commands and events
const CHANNEL_CAPACITY: usize = 64;

/// Reply channel for a command's outcome
pub type Reply = oneshot::Sender<Result<(), RouterError>>;

/// Commands sent to the router actor
#[derive(Debug)]
pub enum RouterCommand {
    /// Select a device by index
    SelectDevice {
        index: usize,
        /// Receives the outcome, if the sender cares
        response: Option<Reply>,
    },

    /// Power on every switch
    PowerOn { response: Option<Reply> },

    /// Power off every switch
    PowerOff { response: Option<Reply> },

    /// Stop the actor
    Shutdown,
}

/// Run `work` on the blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T, RouterError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RouterError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RouterError::TaskFailed(e.to_string()))?
}

fn reply(response: Option<Reply>, result: Result<(), RouterError>) {
    if let Some(tx) = response {
        // The requester may have stopped waiting
        let _ = tx.send(result);
    }
}

/// Queue an event without waiting on the receiver
///
/// A full queue drops the event; replies never wait on event delivery.
fn emit(event_tx: &mpsc::Sender<RouterEvent>, event: RouterEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("Event queue full, dropping {:?}", event);
        }
        // Nobody is listening
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

async fn select(
    router: &Arc<Router>,
    index: usize,
    event_tx: &mpsc::Sender<RouterEvent>,
) -> Result<(), RouterError> {
    debug!("Actor: select device {}", index);
    let worker = Arc::clone(router);
    let result = run_blocking(move || worker.select(index).map(|d| d.title().to_string())).await;

    let event = match &result {
        Ok(title) => RouterEvent::DeviceSelected {
            index,
            title: title.clone(),
        },
        Err(e) => {
            warn!("Select failed: {}", e);
            RouterEvent::Error {
                source: "select".to_string(),
                message: e.to_string(),
            }
        }
    };
    emit(event_tx, event);
    result.map(|_| ())
}

async fn power(
    router: &Arc<Router>,
    on: bool,
    event_tx: &mpsc::Sender<RouterEvent>,
) -> Result<(), RouterError> {
    debug!("Actor: power {}", if on { "on" } else { "off" });
    let worker = Arc::clone(router);
    let result = run_blocking(move || {
        if on {
            worker.power_on_all()
        } else {
            worker.power_off_all()
        }
    })
    .await;

    let event = match &result {
        Ok(()) => RouterEvent::PowerChanged { on },
        Err(e) => {
            warn!("Power change failed: {}", e);
            RouterEvent::Error {
                source: "power".to_string(),
                message: e.to_string(),
            }
        }
    };
    emit(event_tx, event);
    result
}

/// Process commands until `Shutdown` or until every sender is dropped
pub async fn run_router_actor(
    router: Arc<Router>,
    mut cmd_rx: mpsc::Receiver<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
) {
    info!(
        "Router actor started with {} switch(es) and {} device(s)",
        router.switches().len(),
        router.devices().len()
    );

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RouterCommand::SelectDevice { index, response } => {
                reply(response, select(&router, index, &event_tx).await);
            }
            RouterCommand::PowerOn { response } => {
                reply(response, power(&router, true, &event_tx).await);
            }
            RouterCommand::PowerOff { response } => {
                reply(response, power(&router, false, &event_tx).await);
            }
            RouterCommand::Shutdown => {
                info!("Router actor shutting down");
                break;
            }
        }
    }

    emit(&event_tx, RouterEvent::Stopped);
    info!("Router actor stopped");
}

/// Client side of a running router actor
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::Sender<RouterCommand>,
}

impl RouterHandle {
    /// Spawn the actor on the current runtime
    pub fn spawn(router: Arc<Router>) -> (Self, mpsc::Receiver<RouterEvent>, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(run_router_actor(router, cmd_rx, event_tx));
        (Self { tx: cmd_tx }, event_rx, task)
    }

    /// Wrap an existing command sender
    pub fn new(tx: mpsc::Sender<RouterCommand>) -> Self {
        Self { tx }
    }

    async fn request(
        &self,
        make: impl FnOnce(Option<Reply>) -> RouterCommand,
    ) -> Result<(), RouterError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(Some(tx)))
            .await
            .map_err(|_| RouterError::ActorClosed)?;
        rx.await.map_err(|_| RouterError::ActorClosed)?
    }

    /// Select device `index` and wait for the outcome
    pub async fn select(&self, index: usize) -> Result<(), RouterError> {
        self.request(|response| RouterCommand::SelectDevice { index, response })
            .await
    }

    pub async fn power_on(&self) -> Result<(), RouterError> {
        self.request(|response| RouterCommand::PowerOn { response })
            .await
    }

    pub async fn power_off(&self) -> Result<(), RouterError> {
        self.request(|response| RouterCommand::PowerOff { response })
            .await
    }

    /// Ask the actor to stop after the commands already queued
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        self.tx
            .send(RouterCommand::Shutdown)
            .await
            .map_err(|_| RouterError::ActorClosed)
    }
}
