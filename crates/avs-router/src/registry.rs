//! Switch and device registries
//!
//! Both registries keep configuration order. Switches are loaded first so
//! device ties can resolve against them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::device::Device;
use crate::error::RouterError;
use crate::switch::Switch;
use crate::transport::{Transport, TransportConfig, TransportError};

/// Loaded switches keyed by id
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    switches: Vec<Arc<Switch>>,
    by_id: HashMap<String, usize>,
}

impl SwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every switch block, opening transports through `open`
    pub fn load<F>(config: &Map<String, Value>, open: &mut F) -> Result<Self, RouterError>
    where
        F: FnMut(&str, &TransportConfig) -> Result<Transport, TransportError>,
    {
        let mut registry = Self::new();
        for (id, value) in config {
            registry.insert(Switch::from_config(id, value, open)?)?;
        }
        info!("Loaded {} switch(es)", registry.len());
        Ok(registry)
    }

    /// Add a switch; ids must be unique
    pub fn insert(&mut self, switch: Switch) -> Result<Arc<Switch>, RouterError> {
        if self.by_id.contains_key(switch.id()) {
            return Err(RouterError::Config(format!(
                "Switch `{}` is defined more than once",
                switch.id()
            )));
        }
        let switch = Arc::new(switch);
        self.by_id.insert(switch.id().to_string(), self.switches.len());
        self.switches.push(Arc::clone(&switch));
        Ok(switch)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Switch>> {
        self.by_id.get(id).map(|&i| &self.switches[i])
    }

    /// Switches in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Switch>> {
        self.switches.iter()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Power on every switch, attempting all of them
    pub fn power_on_all(&self) -> Result<(), RouterError> {
        self.power_all(true)
    }

    /// Power off every switch, attempting all of them
    pub fn power_off_all(&self) -> Result<(), RouterError> {
        self.power_all(false)
    }

    fn power_all(&self, on: bool) -> Result<(), RouterError> {
        info!("Powering {} all switches", if on { "on" } else { "off" });

        let failures: Vec<(String, RouterError)> = self
            .switches
            .iter()
            .filter_map(|switch| {
                let result = if on {
                    switch.power_on()
                } else {
                    switch.power_off()
                };
                result.err().map(|e| {
                    warn!("Power change failed on `{}`: {}", switch.id(), e);
                    (switch.id().to_string(), e)
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RouterError::PowerFailed { on, failures })
        }
    }
}

/// Loaded devices in configuration order
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every device block; ties must name loaded switches
    pub fn load(
        config: &[Value],
        switches: &SwitchRegistry,
        base_dir: Option<&Path>,
    ) -> Result<Self, RouterError> {
        let devices = config
            .iter()
            .enumerate()
            .map(|(index, value)| Device::from_config(index, value, switches, base_dir))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Loaded {} device(s)", devices.len());
        Ok(Self { devices })
    }

    /// Append a device; its index must match its position
    pub fn push(&mut self, device: Device) -> Result<(), RouterError> {
        if device.index() != self.devices.len() {
            return Err(RouterError::Config(format!(
                "Device `{}` has index {}, expected {}",
                device.title(),
                device.index(),
                self.devices.len()
            )));
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    /// Look up by index, then by exact title, then by case-insensitive title
    pub fn find(&self, query: &str) -> Option<&Device> {
        if let Ok(index) = query.parse::<usize>() {
            if let Some(device) = self.get(index) {
                return Some(device);
            }
        }
        self.devices
            .iter()
            .find(|d| d.title() == query)
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.title().eq_ignore_ascii_case(query))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
