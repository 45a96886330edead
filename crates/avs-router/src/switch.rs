//! Configured switches
//!
//! A [`Switch`] pairs a configured id and title with one driver. The driver
//! sits behind a mutex so the whole encode-then-write sequence of a command is
//! serialised per switch while switches are shared between threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::{DriverConfig, SwitchConfig};
use crate::drivers::{Driver, DriverCapabilities, DriverError, DriverKind, DriverSettings};
use crate::error::{validate, RouterError};
use crate::transport::{Transport, TransportConfig, TransportError};

/// A loaded switch
#[derive(Debug)]
pub struct Switch {
    id: String,
    title: String,
    kind: DriverKind,
    capabilities: DriverCapabilities,
    default_output: u32,
    driver: Mutex<Driver>,
}

impl Switch {
    /// Wrap an already-built driver
    pub fn new(
        id: impl Into<String>,
        title: Option<String>,
        driver: Driver,
    ) -> Result<Self, RouterError> {
        let id = id.into();
        validate(!id.is_empty(), || "Switch ID cannot be empty".to_string())?;

        Ok(Self {
            title: title.unwrap_or_else(|| id.clone()),
            kind: driver.kind(),
            capabilities: driver.capabilities(),
            default_output: driver.default_output(),
            driver: Mutex::new(driver),
            id,
        })
    }

    /// Validate a switch block and open its transport through `open`
    pub fn from_config<F>(id: &str, value: &Value, open: &mut F) -> Result<Self, RouterError>
    where
        F: FnMut(&str, &TransportConfig) -> Result<Transport, TransportError>,
    {
        validate(!id.is_empty(), || "Switch ID cannot be empty".to_string())?;
        let config = SwitchConfig::from_value(id, value)?;

        let name = config
            .driver
            .as_deref()
            .ok_or_else(|| RouterError::Config(format!("Driver not specified for `{}`", id)))?;
        let kind = DriverKind::from_name(name).ok_or_else(|| RouterError::UnknownDriver {
            switch: id.to_string(),
            name: name.to_string(),
        })?;
        let driver_config = config.config.as_ref().ok_or_else(|| {
            RouterError::Config(format!("Switch configuration not specified for `{}`", id))
        })?;
        let driver_config = DriverConfig::from_value(id, driver_config)?;
        let settings = DriverSettings::from_config(kind, id, &driver_config)?;

        let title = config.title.unwrap_or_else(|| id.to_string());
        info!("Loading `{}` for `{}` as `{}`", kind.title(), title, id);
        debug!("`{}` connects via {}", id, settings.transport().endpoint);

        let transport =
            open(id, settings.transport()).map_err(|source| RouterError::Transport {
                switch: id.to_string(),
                source,
            })?;

        Self::new(id, Some(title), Driver::with_transport(settings, transport))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    pub fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    /// Output channel for ties that give none
    pub fn default_output(&self) -> u32 {
        self.default_output
    }

    /// A panic in another thread mid-send leaves the driver usable
    fn driver(&self) -> MutexGuard<'_, Driver> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self, error: DriverError) -> RouterError {
        match error {
            DriverError::OutOfRange(message) => {
                RouterError::Validation(format!("{} on `{}`", message, self.id))
            }
            DriverError::Transport(source) => RouterError::Transport {
                switch: self.id.clone(),
                source,
            },
        }
    }

    pub fn set_tie(
        &self,
        input: u32,
        video_output: u32,
        audio_output: u32,
    ) -> Result<(), RouterError> {
        debug!(
            "`{}`: tie input {} to video {} audio {}",
            self.id, input, video_output, audio_output
        );
        self.driver()
            .set_tie(input, video_output, audio_output)
            .map_err(|e| self.attach(e))
    }

    pub fn power_on(&self) -> Result<(), RouterError> {
        debug!("`{}`: power on", self.id);
        self.driver().power_on().map_err(|e| self.attach(e))
    }

    pub fn power_off(&self) -> Result<(), RouterError> {
        debug!("`{}`: power off", self.id);
        self.driver().power_off().map_err(|e| self.attach(e))
    }
}
