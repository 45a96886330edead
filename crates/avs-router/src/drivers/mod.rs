//! Hardware drivers
//!
//! Each driver wraps one [`Transport`] and one protocol codec and exposes the
//! same three operations: `set_tie`, `power_on` and `power_off`. The set of
//! drivers is closed; configuration picks one by its registered name.

pub mod extron;
pub mod sony_monitor;
pub mod tesla_smart;

use std::time::Duration;

use avs_protocol::Protocol;
use bitflags::bitflags;
use thiserror::Error;

use crate::config::DriverConfig;
use crate::error::RouterError;
use crate::transport::{LineSettings, Transport, TransportConfig, TransportError};

pub use extron::{ExtronDriver, ExtronSettings};
pub use sony_monitor::{SonyMonitorDriver, SonyMonitorSettings};
pub use tesla_smart::{TeslaSmartDriver, TeslaSmartSettings};

bitflags! {
    /// What a driver's hardware can route
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriverCapabilities: u8 {
        /// The switch has more than one output
        const HAS_MULTIPLE_OUTPUTS = 1 << 0;
        /// Audio and video can be tied to different outputs
        const CAN_DECOUPLE_AUDIO_OUTPUT = 1 << 1;
    }
}

/// Errors raised by a driver before switch context is attached
#[derive(Debug, Error)]
pub enum DriverError {
    /// Channel argument outside the driver's bounds; nothing was sent
    #[error("{0}")]
    OutOfRange(String),

    /// Transport failed while sending
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Fail with an out-of-range error unless `condition` holds
pub(crate) fn check_range(condition: bool, message: &str) -> Result<(), DriverError> {
    if condition {
        Ok(())
    } else {
        Err(DriverError::OutOfRange(message.to_string()))
    }
}

/// Pick a serial or network transport, preferring `tty` over `host`
pub(crate) fn serial_or_network(
    switch_id: &str,
    config: &DriverConfig,
    line: LineSettings,
    default_port: u16,
) -> Result<TransportConfig, RouterError> {
    let transport = if let Some(tty) = &config.tty {
        let line = LineSettings {
            baud_rate: config.baud_rate.unwrap_or(line.baud_rate),
            ..line
        };
        TransportConfig::serial(tty.clone(), line)
    } else if let Some(host) = &config.host {
        TransportConfig::network(host.clone(), config.port.unwrap_or(default_port))
    } else {
        return Err(RouterError::Validation(format!(
            "Either `tty` or `host` must be specified for `{}`",
            switch_id
        )));
    };
    Ok(apply_timeout(transport, config))
}

/// Apply a configured `timeoutMs`, if any
pub(crate) fn apply_timeout(transport: TransportConfig, config: &DriverConfig) -> TransportConfig {
    match config.timeout_ms {
        Some(ms) => transport.with_timeout(Duration::from_millis(ms)),
        None => transport,
    }
}

/// Registered driver implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// Extron SIS matrix switch
    Extron,
    /// TeslaSmart input selector
    TeslaSmart,
    /// Sony BVM-D series monitor
    SonyMonitor,
}

impl DriverKind {
    /// Every registered driver
    pub const ALL: [DriverKind; 3] = [
        DriverKind::Extron,
        DriverKind::TeslaSmart,
        DriverKind::SonyMonitor,
    ];

    /// The name used to select this driver in configuration
    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::Extron => "extron",
            DriverKind::TeslaSmart => "tesla-smart",
            DriverKind::SonyMonitor => "sony-bvm-d",
        }
    }

    /// Human-readable title
    pub fn title(&self) -> &'static str {
        match self {
            DriverKind::Extron => "Extron SIS",
            DriverKind::TeslaSmart => "Tesla-Smart",
            DriverKind::SonyMonitor => "Sony BVM-D series",
        }
    }

    /// Wire protocol spoken by this driver
    pub fn protocol(&self) -> Protocol {
        match self {
            DriverKind::Extron => Protocol::ExtronSis,
            DriverKind::TeslaSmart => Protocol::TeslaSmart,
            DriverKind::SonyMonitor => Protocol::SonyBvmD,
        }
    }

    /// Look up a driver by its configured name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Validated driver settings, ready to be paired with a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSettings {
    Extron(ExtronSettings),
    TeslaSmart(TeslaSmartSettings),
    SonyMonitor(SonyMonitorSettings),
}

impl DriverSettings {
    /// Validate the driver-specific configuration block of a switch
    pub fn from_config(
        kind: DriverKind,
        switch_id: &str,
        config: &DriverConfig,
    ) -> Result<Self, RouterError> {
        match kind {
            DriverKind::Extron => ExtronSettings::from_config(switch_id, config).map(Self::Extron),
            DriverKind::TeslaSmart => {
                TeslaSmartSettings::from_config(switch_id, config).map(Self::TeslaSmart)
            }
            DriverKind::SonyMonitor => {
                SonyMonitorSettings::from_config(switch_id, config).map(Self::SonyMonitor)
            }
        }
    }

    /// Which driver these settings belong to
    pub fn kind(&self) -> DriverKind {
        match self {
            Self::Extron(_) => DriverKind::Extron,
            Self::TeslaSmart(_) => DriverKind::TeslaSmart,
            Self::SonyMonitor(_) => DriverKind::SonyMonitor,
        }
    }

    /// Transport the driver should be connected through
    pub fn transport(&self) -> &TransportConfig {
        match self {
            Self::Extron(s) => &s.transport,
            Self::TeslaSmart(s) => &s.transport,
            Self::SonyMonitor(s) => &s.transport,
        }
    }
}

/// A driver instance bound to its transport
#[derive(Debug)]
pub enum Driver {
    Extron(ExtronDriver),
    TeslaSmart(TeslaSmartDriver),
    SonyMonitor(SonyMonitorDriver),
}

impl Driver {
    /// Open the configured transport and build the driver
    pub fn open(settings: DriverSettings) -> Result<Self, TransportError> {
        let transport = Transport::open(settings.transport())?;
        Ok(Self::with_transport(settings, transport))
    }

    /// Build the driver around an already-open transport
    pub fn with_transport(settings: DriverSettings, transport: Transport) -> Self {
        match settings {
            DriverSettings::Extron(s) => Driver::Extron(ExtronDriver::new(s, transport)),
            DriverSettings::TeslaSmart(s) => {
                Driver::TeslaSmart(TeslaSmartDriver::new(s, transport))
            }
            DriverSettings::SonyMonitor(s) => {
                Driver::SonyMonitor(SonyMonitorDriver::new(s, transport))
            }
        }
    }

    /// Which driver this is
    pub fn kind(&self) -> DriverKind {
        match self {
            Driver::Extron(_) => DriverKind::Extron,
            Driver::TeslaSmart(_) => DriverKind::TeslaSmart,
            Driver::SonyMonitor(_) => DriverKind::SonyMonitor,
        }
    }

    /// Routing capabilities, fixed at construction
    pub fn capabilities(&self) -> DriverCapabilities {
        match self {
            Driver::Extron(d) => d.capabilities(),
            Driver::TeslaSmart(_) | Driver::SonyMonitor(_) => DriverCapabilities::empty(),
        }
    }

    /// Output channel used when a tie gives none
    ///
    /// Single-output selectors and monitors take the sentinel 0. An Extron
    /// with one output only ever ties to output 1.
    pub fn default_output(&self) -> u32 {
        match self {
            Driver::Extron(_) => 1,
            Driver::TeslaSmart(_) | Driver::SonyMonitor(_) => 0,
        }
    }

    /// Connect an input to the given video and audio outputs
    pub fn set_tie(
        &mut self,
        input: u32,
        video_output: u32,
        audio_output: u32,
    ) -> Result<(), DriverError> {
        match self {
            Driver::Extron(d) => d.set_tie(input, video_output, audio_output),
            Driver::TeslaSmart(d) => d.set_tie(input, video_output, audio_output),
            Driver::SonyMonitor(d) => d.set_tie(input, video_output, audio_output),
        }
    }

    /// Power on; passive switches have nothing to do
    pub fn power_on(&mut self) -> Result<(), DriverError> {
        match self {
            Driver::SonyMonitor(d) => d.power_on(),
            Driver::Extron(_) | Driver::TeslaSmart(_) => Ok(()),
        }
    }

    /// Power off; passive switches have nothing to do
    pub fn power_off(&mut self) -> Result<(), DriverError> {
        match self {
            Driver::SonyMonitor(d) => d.power_off(),
            Driver::Extron(_) | Driver::TeslaSmart(_) => Ok(()),
        }
    }
}
