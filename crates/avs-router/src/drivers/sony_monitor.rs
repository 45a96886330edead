//! Sony BVM-D series monitor driver
//!
//! The monitor sits on an RS-485 bus; commands are broadcast to every
//! address. Channel selection uses `SET_CHANNEL` with a fixed first argument
//! of 1 and the channel in the second.

use avs_protocol::sony_bvm::{Address, Command, CommandBlock, BAUD_RATE};
use avs_protocol::EncodeCommand;
use tracing::warn;

use super::{apply_timeout, check_range, DriverError};
use crate::config::DriverConfig;
use crate::error::RouterError;
use crate::transport::{LineSettings, Transport, TransportConfig};

/// Serial line fixed by the protocol
pub const LINE: LineSettings = LineSettings::eight_o_one(BAUD_RATE);
/// Highest selectable channel
pub const MAX_CHANNEL: u32 = 99;
/// First argument of every `SET_CHANNEL`
const SET_CHANNEL_ARG0: u8 = 1;

/// Validated Sony monitor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SonyMonitorSettings {
    /// Serial line the monitor bus is on
    pub transport: TransportConfig,
}

impl SonyMonitorSettings {
    pub fn from_config(switch_id: &str, config: &DriverConfig) -> Result<Self, RouterError> {
        let tty = config.tty.as_ref().ok_or_else(|| {
            RouterError::Validation(format!(
                "Missing `tty` for Sony monitor `{}` (serial only)",
                switch_id
            ))
        })?;
        if config.baud_rate.is_some_and(|baud| baud != BAUD_RATE) {
            warn!(
                "Ignoring `baudRate` for `{}`: Sony monitors always run at {}",
                switch_id, LINE
            );
        }

        Ok(Self {
            transport: apply_timeout(TransportConfig::serial(tty.clone(), LINE), config),
        })
    }
}

/// Monitor reachable only by broadcast
#[derive(Debug)]
pub struct SonyMonitorDriver {
    transport: Transport,
}

impl SonyMonitorDriver {
    pub fn new(_settings: SonyMonitorSettings, transport: Transport) -> Self {
        Self { transport }
    }

    fn send(&mut self, block: CommandBlock) -> Result<(), DriverError> {
        self.transport.send(&block.encode())?;
        Ok(())
    }

    fn broadcast(command: Command) -> CommandBlock {
        CommandBlock::new(Address::all(), Address::all(), command)
    }

    /// Switch the monitor to channel `input`; outputs must be 0
    pub fn set_tie(
        &mut self,
        input: u32,
        video_output: u32,
        audio_output: u32,
    ) -> Result<(), DriverError> {
        check_range(
            (1..=MAX_CHANNEL).contains(&input),
            &format!("channel {} out of range 1..={}", input, MAX_CHANNEL),
        )?;
        check_range(
            video_output == 0 && audio_output == 0,
            &format!(
                "outputs must be 0 on a monitor, got video {} audio {}",
                video_output, audio_output
            ),
        )?;

        // Bounded by MAX_CHANNEL above
        let channel = input as u8;
        self.send(Self::broadcast(Command::SetChannel).with_args(SET_CHANNEL_ARG0, channel))
    }

    pub fn power_on(&mut self) -> Result<(), DriverError> {
        self.send(Self::broadcast(Command::PowerOn))
    }

    pub fn power_off(&mut self) -> Result<(), DriverError> {
        self.send(Self::broadcast(Command::PowerOff))
    }
}
