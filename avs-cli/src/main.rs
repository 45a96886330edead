//! avswitch - AV Switch Router
//!
//! Headless control for the routing engine: list the configured switches and
//! devices, select a device, or power every switch on or off.

mod paths;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use avs_router::{DriverKind, Router, RouterEvent, RouterHandle};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "avswitch")]
#[command(about = "Route AV devices through matrix switches and monitors")]
#[command(version)]
struct Cli {
    /// Configuration file, or a directory containing config.json
    #[arg(long, short, env = "AVSWITCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured switches and devices
    List,

    /// List the available drivers
    Drivers,

    /// Select a device by index or title
    Select {
        /// Device index or title
        device: String,
    },

    /// Power every switch on or off
    Power {
        #[arg(value_enum)]
        state: PowerState,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PowerState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so listings stay pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "avswitch=info,avs_protocol=info,avs_router=info,avs_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Drivers => {
            list_drivers();
            Ok(())
        }
        Commands::List => {
            let router = load(cli.config).await?;
            list(&router);
            Ok(())
        }
        Commands::Select { device } => select(load(cli.config).await?, &device).await,
        Commands::Power { state } => power(load(cli.config).await?, state).await,
    }
}

/// Resolve and load the configuration; opening serial ports blocks
async fn load(config: Option<PathBuf>) -> Result<Arc<Router>> {
    let path = paths::resolve_config(config.as_deref())
        .context("could not determine the configuration directory; pass --config")?;
    info!("Using configuration {}", path.display());

    let router = tokio::task::spawn_blocking({
        let path = path.clone();
        move || Router::load(&path)
    })
    .await
    .context("configuration loader panicked")?
    .with_context(|| format!("failed to load {}", path.display()))?;

    Ok(Arc::new(router))
}

fn list_drivers() {
    for kind in DriverKind::ALL {
        println!(
            "{:<12} {} ({})",
            kind.name(),
            kind.title(),
            kind.protocol().name()
        );
    }
}

fn list(router: &Router) {
    println!("Switches:");
    for switch in router.switches().iter() {
        println!(
            "  {:<12} {} [{}]",
            switch.id(),
            switch.title(),
            switch.kind().title()
        );
    }

    println!("Devices:");
    for device in router.devices().iter() {
        let ties = device
            .ties()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {:>3}  {:<20} {}", device.index(), device.title(), ties);
        if let Some(image) = device.image() {
            println!("       image: {}", image.display());
        }
    }
}

fn report(event: &RouterEvent) {
    match event {
        RouterEvent::DeviceSelected { index, title } => println!("Selected {}: {}", index, title),
        RouterEvent::PowerChanged { on } => {
            println!("Power {}", if *on { "on" } else { "off" })
        }
        // Errors are returned to main and reported there
        RouterEvent::Error { .. } | RouterEvent::Stopped => {}
    }
}

/// Run one request through the router actor, then drain its events
async fn run_actor<F, Fut>(router: Arc<Router>, request: F) -> Result<()>
where
    F: FnOnce(RouterHandle) -> Fut,
    Fut: std::future::Future<Output = Result<(), avs_router::RouterError>>,
{
    let (handle, mut events, task) = RouterHandle::spawn(router);

    let result = request(handle.clone()).await;
    handle.shutdown().await?;
    task.await.context("router actor panicked")?;

    while let Some(event) = events.recv().await {
        report(&event);
    }
    Ok(result?)
}

async fn select(router: Arc<Router>, query: &str) -> Result<()> {
    let index = router.find_device(query)?.index();
    run_actor(router, |handle| async move { handle.select(index).await }).await
}

async fn power(router: Arc<Router>, state: PowerState) -> Result<()> {
    run_actor(router, |handle| async move {
        match state {
            PowerState::On => handle.power_on().await,
            PowerState::Off => handle.power_off().await,
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_select() {
        let cli = Cli::try_parse_from(["avswitch", "--config", "/tmp/rack.json", "select", "SNES"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rack.json")));
        assert!(matches!(cli.command, Commands::Select { ref device } if device == "SNES"));
    }

    #[test]
    fn test_parse_power() {
        let cli = Cli::try_parse_from(["avswitch", "power", "off"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Power {
                state: PowerState::Off
            }
        ));
        assert!(Cli::try_parse_from(["avswitch", "power", "maybe"]).is_err());
    }
}
