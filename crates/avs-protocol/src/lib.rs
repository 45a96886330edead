//! AV Switch Protocol Library
//!
//! This crate provides encoding and decoding for the wire protocols spoken by
//! the audio/video switches and monitors the router controls:
//!
//! - **Extron SIS**: ASCII tie commands (`1*2%` video, `1*2$` audio)
//! - **TeslaSmart**: fixed 6-byte binary input-select frame
//! - **Sony BVM-D**: checksummed packets carrying addressed command blocks (RS-485)
//!
//! # Architecture
//!
//! Each protocol module provides:
//! - Command types that encode to protocol-specific bytes
//! - A streaming codec that handles partial data and yields decoded commands
//!
//! The drivers are fire-and-forget: nothing in the control path reads a reply.
//! Decoding exists for virtual hardware and for any future reply handling.
//!
//! # Example
//!
//! ```rust
//! use avs_protocol::sony_bvm::{Address, Command, CommandBlock};
//! use avs_protocol::EncodeCommand;
//!
//! let block = CommandBlock::new(Address::all(), Address::all(), Command::SetChannel)
//!     .with_args(1, 10);
//! let bytes = block.encode();
//! assert_eq!(bytes, vec![0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A, 0x4E]);
//! ```

pub mod error;
pub mod extron;
pub mod sony_bvm;
pub mod tesla_smart;

pub use error::ProtocolError;

/// Identifies which wire protocol a driver speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protocol {
    /// Extron Simple Instruction Set (ASCII)
    ExtronSis,
    /// TeslaSmart binary input selection
    TeslaSmart,
    /// Sony BVM-D series RS-485 packets
    SonyBvmD,
}

impl Protocol {
    /// Returns a human-readable name for the protocol
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::ExtronSis => "Extron SIS",
            Protocol::TeslaSmart => "TeslaSmart",
            Protocol::SonyBvmD => "Sony BVM-D",
        }
    }
}

/// Trait for protocol codecs that can parse incoming data streams
pub trait ProtocolCodec {
    /// The command type produced by this codec
    type Command;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete command from the buffer
    fn next_command(&mut self) -> Option<Self::Command>;

    /// Try to extract the next complete command along with its raw bytes
    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}

/// Format bytes as space-separated hex for log output
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_formatting() {
        assert_eq!(hex(&[0xAA, 0xBB, 0x03]), "AA BB 03");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(Protocol::ExtronSis.name(), "Extron SIS");
        assert_eq!(Protocol::SonyBvmD.name(), "Sony BVM-D");
    }
}
