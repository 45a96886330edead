//! The top-level routing model

use std::path::Path;

use tracing::info;

use crate::config::RouterConfig;
use crate::device::Device;
use crate::error::RouterError;
use crate::registry::{DeviceRegistry, SwitchRegistry};
use crate::transport::{Transport, TransportConfig, TransportError};

/// Switches and devices loaded from one configuration
#[derive(Debug)]
pub struct Router {
    switches: SwitchRegistry,
    devices: DeviceRegistry,
}

impl Router {
    pub fn new(switches: SwitchRegistry, devices: DeviceRegistry) -> Self {
        Self { switches, devices }
    }

    /// Load a configuration file, opening real transports
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        Self::load_with(path, &mut |_: &str, config: &TransportConfig| {
            Transport::open(config)
        })
    }

    /// Load a configuration file, opening transports through `open`
    pub fn load_with<F>(path: &Path, open: &mut F) -> Result<Self, RouterError>
    where
        F: FnMut(&str, &TransportConfig) -> Result<Transport, TransportError>,
    {
        info!("Loading configuration from {}", path.display());
        let config = RouterConfig::load(path)?;
        Self::from_config(&config, path.parent(), open)
    }

    /// Build from a parsed configuration
    ///
    /// Every switch and device is validated before anything is sent; the only
    /// side effect of loading is opening transports.
    pub fn from_config<F>(
        config: &RouterConfig,
        base_dir: Option<&Path>,
        open: &mut F,
    ) -> Result<Self, RouterError>
    where
        F: FnMut(&str, &TransportConfig) -> Result<Transport, TransportError>,
    {
        let switches = SwitchRegistry::load(&config.switches, open)?;
        let devices = DeviceRegistry::load(&config.devices, &switches, base_dir)?;
        Ok(Self::new(switches, devices))
    }

    pub fn switches(&self) -> &SwitchRegistry {
        &self.switches
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Find a device by index or title
    pub fn find_device(&self, query: &str) -> Result<&Device, RouterError> {
        self.devices
            .find(query)
            .ok_or_else(|| RouterError::DeviceNotFound(query.to_string()))
    }

    /// Select device `index`
    pub fn select(&self, index: usize) -> Result<&Device, RouterError> {
        let device = self
            .devices
            .get(index)
            .ok_or_else(|| RouterError::DeviceNotFound(index.to_string()))?;
        device.select()?;
        Ok(device)
    }

    pub fn power_on_all(&self) -> Result<(), RouterError> {
        self.switches.power_on_all()
    }

    pub fn power_off_all(&self) -> Result<(), RouterError> {
        self.switches.power_off_all()
    }
}
