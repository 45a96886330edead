//! TeslaSmart Protocol Implementation
//!
//! TeslaSmart HDMI/SDI selectors take a fixed 6-byte frame that picks the
//! active input. There is no output routing.
//!
//! # Frame Format
//! ```text
//! AA BB 03 01 [input] EE
//! ```

use crate::{EncodeCommand, ProtocolCodec};

/// Frame header bytes
pub const HEADER: [u8; 4] = [0xAA, 0xBB, 0x03, 0x01];
/// Frame trailer byte
pub const TRAILER: u8 = 0xEE;
/// Total frame length
pub const FRAME_LEN: usize = 6;

/// TeslaSmart command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeslaSmartCommand {
    /// Select the active input
    SelectInput { input: u8 },
}

impl EncodeCommand for TeslaSmartCommand {
    fn encode(&self) -> Vec<u8> {
        match self {
            TeslaSmartCommand::SelectInput { input } => {
                let mut frame = HEADER.to_vec();
                frame.push(*input);
                frame.push(TRAILER);
                frame
            }
        }
    }
}

/// Streaming frame codec
#[derive(Debug)]
pub struct TeslaSmartCodec {
    buffer: Vec<u8>,
}

impl TeslaSmartCodec {
    /// Create a new TeslaSmart codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(FRAME_LEN * 2),
        }
    }

    /// Find the start of a frame (AA BB sequence)
    fn find_header(&self) -> Option<usize> {
        self.buffer
            .windows(2)
            .position(|w| w[0] == HEADER[0] && w[1] == HEADER[1])
    }
}

impl Default for TeslaSmartCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for TeslaSmartCodec {
    type Command = TeslaSmartCommand;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        loop {
            let Some(start) = self.find_header() else {
                // Keep a trailing AA in case the BB is still in flight
                let keep = usize::from(self.buffer.last() == Some(&HEADER[0]));
                let drop_len = self.buffer.len() - keep;
                self.buffer.drain(..drop_len);
                return None;
            };
            self.buffer.drain(..start);

            if self.buffer.len() < FRAME_LEN {
                return None;
            }

            let frame: Vec<u8> = self.buffer[..FRAME_LEN].to_vec();
            if frame[..4] == HEADER && frame[5] == TRAILER {
                self.buffer.drain(..FRAME_LEN);
                return Some((TeslaSmartCommand::SelectInput { input: frame[4] }, frame));
            }

            tracing::warn!("Discarding malformed TeslaSmart frame: {}", crate::hex(&frame));
            self.buffer.drain(..2);
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}
