//! TeslaSmart input selector driver

use avs_protocol::tesla_smart::TeslaSmartCommand;
use avs_protocol::EncodeCommand;

use super::{check_range, serial_or_network, DriverError};
use crate::config::DriverConfig;
use crate::error::{validate, RouterError};
use crate::transport::{LineSettings, Transport, TransportConfig};

/// TCP port used when `host` is given without `port`
pub const DEFAULT_PORT: u16 = 5000;
/// Serial line used when `tty` is given
pub const DEFAULT_LINE: LineSettings = LineSettings::eight_n_one(9600);
/// The input travels in a single byte
pub const MAX_SUPPORTED_INPUTS: u32 = u8::MAX as u32;

/// Validated TeslaSmart configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeslaSmartSettings {
    /// Highest input number
    pub max_inputs: u32,
    /// Where the selector is reached
    pub transport: TransportConfig,
}

impl TeslaSmartSettings {
    pub fn from_config(switch_id: &str, config: &DriverConfig) -> Result<Self, RouterError> {
        let max_inputs = config.max_inputs.ok_or_else(|| {
            RouterError::Validation(format!(
                "Missing `maxInputs` for Tesla-Smart switch `{}`",
                switch_id
            ))
        })?;
        validate((1..=MAX_SUPPORTED_INPUTS).contains(&max_inputs), || {
            format!(
                "`maxInputs` must be within 1..={} for `{}`",
                MAX_SUPPORTED_INPUTS, switch_id
            )
        })?;

        Ok(Self {
            max_inputs,
            transport: serial_or_network(switch_id, config, DEFAULT_LINE, DEFAULT_PORT)?,
        })
    }
}

/// Single-output selector; only the input is meaningful
#[derive(Debug)]
pub struct TeslaSmartDriver {
    max_inputs: u32,
    transport: Transport,
}

impl TeslaSmartDriver {
    pub fn new(settings: TeslaSmartSettings, transport: Transport) -> Self {
        Self {
            max_inputs: settings.max_inputs,
            transport,
        }
    }

    /// Select `input`; both outputs must be the sentinel 0
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
            video_output == 0 && audio_output == 0,
            &format!(
                "outputs must be 0 on a single-output selector, got video {} audio {}",
                video_output, audio_output
            ),
        )?;
        let input = u8::try_from(input)
            .map_err(|_| DriverError::OutOfRange(format!("input {} exceeds one byte", input)))?;

        self.transport
            .send(&TeslaSmartCommand::SelectInput { input }.encode())?;
        Ok(())
    }
}
