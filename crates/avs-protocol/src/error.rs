//! Error types for protocol encoding and decoding

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet framing is broken (stream ended early, bad size, unknown type)
    #[error("packet framing error: {0}")]
    PacketFraming(String),

    /// Checksum mismatch
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Command block is too short or carries an invalid address
    #[error("malformed command block: {0}")]
    CommandBlockMalformed(String),

    /// Value does not fit the field it is encoded into
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

impl ProtocolError {
    /// Returns true if this error came from decoding a reply or echo
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::PacketFraming(_) | Self::ChecksumMismatch { .. } | Self::CommandBlockMalformed(_)
        )
    }
}
