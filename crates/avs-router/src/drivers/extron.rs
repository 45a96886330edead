//! Extron SIS matrix switch driver

use avs_protocol::extron::encode_tie;

use super::{check_range, serial_or_network, DriverCapabilities, DriverError};
use crate::config::DriverConfig;
use crate::error::{validate, RouterError};
use crate::transport::{LineSettings, Transport, TransportConfig};

/// Telnet port used when `host` is given without `port`
pub const DEFAULT_PORT: u16 = 23;
/// Serial line used when `tty` is given
pub const DEFAULT_LINE: LineSettings = LineSettings::eight_n_one(9600);

/// Validated Extron configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtronSettings {
    /// Highest input number
    pub max_inputs: u32,
    /// Highest output number
    pub max_outputs: u32,
    /// Where the switch is reached
    pub transport: TransportConfig,
}

impl ExtronSettings {
    pub fn from_config(switch_id: &str, config: &DriverConfig) -> Result<Self, RouterError> {
        let max_inputs = config.max_inputs.ok_or_else(|| {
            RouterError::Validation(format!("Missing `maxInputs` for Extron switch `{}`", switch_id))
        })?;
        let max_outputs = config.max_outputs.ok_or_else(|| {
            RouterError::Validation(format!(
                "Missing `maxOutputs` for Extron switch `{}`",
                switch_id
            ))
        })?;
        validate(max_inputs >= 1, || {
            format!("`maxInputs` must be at least 1 for `{}`", switch_id)
        })?;
        validate(max_outputs >= 1, || {
            format!("`maxOutputs` must be at least 1 for `{}`", switch_id)
        })?;

        Ok(Self {
            max_inputs,
            max_outputs,
            transport: serial_or_network(switch_id, config, DEFAULT_LINE, DEFAULT_PORT)?,
        })
    }

    /// Capabilities implied by the output count
    pub fn capabilities(&self) -> DriverCapabilities {
        if self.max_outputs > 1 {
            DriverCapabilities::HAS_MULTIPLE_OUTPUTS | DriverCapabilities::CAN_DECOUPLE_AUDIO_OUTPUT
        } else {
            DriverCapabilities::CAN_DECOUPLE_AUDIO_OUTPUT
        }
    }
}

/// Extron matrix switch with independent video and audio planes
#[derive(Debug)]
pub struct ExtronDriver {
    max_inputs: u32,
    max_outputs: u32,
    capabilities: DriverCapabilities,
    transport: Transport,
}

impl ExtronDriver {
    pub fn new(settings: ExtronSettings, transport: Transport) -> Self {
        Self {
            capabilities: settings.capabilities(),
            max_inputs: settings.max_inputs,
            max_outputs: settings.max_outputs,
            transport,
        }
    }

    pub fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    /// Tie `input` to `video_output` and `audio_output`
    ///
    /// Both lines go out in a single write, so a network switch sees them on
    /// one connection.
    pub fn set_tie(
        &mut self,
        input: u32,
        video_output: u32,
        audio_output: u32,
    ) -> Result<(), DriverError> {
        check_range(
            (1..=self.max_inputs).contains(&input),
            &format!("input {} out of range 1..={}", input, self.max_inputs),
        )?;
        check_range(
            (1..=self.max_outputs).contains(&video_output),
            &format!(
                "video output {} out of range 1..={}",
                video_output, self.max_outputs
            ),
        )?;
        check_range(
            (1..=self.max_outputs).contains(&audio_output),
            &format!(
                "audio output {} out of range 1..={}",
                audio_output, self.max_outputs
            ),
        )?;

        self.transport
            .send(&encode_tie(input, video_output, audio_output))?;
        Ok(())
    }
}
