//! Sony BVM-D Series RS-485 Protocol Implementation
//!
//! Sony BVM D-series monitors are controlled over an RS-485 bus at 38400 baud,
//! 8 data bits, odd parity, one stop bit. Commands are command blocks carried
//! inside checksummed packets. The packet layout loosely follows the 9-pin
//! protocol, hence the packet type naming.
//!
//! # Packet Format
//! ```text
//! [type] [size N] [data 0..N] [checksum]
//! ```
//!
//! - `type`: packet type, only `0x02` (transport control) is known
//! - `size`: length of the data field only
//! - `checksum`: `(!sum(data) & 0xFF) - (N - 1)`, modulo 256
//!
//! # Command Block Format
//! ```text
//! [destination] [source] [command hi] [command lo] [arg0]? [arg1]?
//! ```
//!
//! Arguments are optional; `arg1` is only ever written after `arg0`.
//!
//! # Address Format
//! - Bits 7..5: address kind (`C0` all monitors, `80` group, `00` single monitor)
//! - Bits 4..0: address number (must be zero for all monitors)

use std::io::{ErrorKind, Read};

use crate::error::ProtocolError;
use crate::{EncodeCommand, ProtocolCodec};

/// Serial line speed required by the monitors
pub const BAUD_RATE: u32 = 38400;

/// Highest address number that fits the 5-bit address field
pub const MAX_ADDRESS_NUMBER: u8 = 0x1F;

/// Mask selecting the address kind bits
const ADDRESS_KIND_MASK: u8 = 0xE0;

/// Minimum command block: destination, source and a 2-byte command
const MIN_COMMAND_BLOCK_LEN: usize = 4;

/// Packet type plus size byte
const PACKET_HEADER_LEN: usize = 2;

/// Identifies the type of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    /// A simple data packet carrying a command block
    TransportControl = 0x02,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x02 => Ok(Self::TransportControl),
            _ => Err(ProtocolError::PacketFraming(format!(
                "unknown packet type 0x{:02X}",
                value
            ))),
        }
    }
}

/// Compute the monitor checksum for a packet's data field
///
/// One's complement of the byte sum, truncated to 8 bits, minus the data
/// length less one. All arithmetic wraps at 8 bits.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    let adjust = (data.len() as u8).wrapping_sub(1);
    (!sum).wrapping_sub(adjust)
}

/// A data packet that encapsulates a command block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    data: Vec<u8>,
}

impl Packet {
    /// Create a packet, rejecting data that does not fit the size byte
    pub fn new(packet_type: PacketType, data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() > u8::MAX as usize {
            return Err(ProtocolError::OutOfRange(format!(
                "packet data is {} bytes, at most 255 allowed",
                data.len()
            )));
        }
        Ok(Self { packet_type, data })
    }

    /// The packet type
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The packet data field
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The checksum this packet carries on the wire
    pub fn checksum(&self) -> u8 {
        checksum(&self.data)
    }

    /// Parse a complete packet from a byte slice
    ///
    /// Trailing bytes after the checksum are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = bytes;
        Self::read_from(&mut reader)
    }

    /// Read and parse the next packet from a byte stream
    ///
    /// The data field may arrive over several short reads; only a true end of
    /// stream cuts it short, which then fails as a framing error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let packet_type = read_byte(reader)?
            .ok_or_else(|| ProtocolError::PacketFraming("missing packet type".into()))?;
        let size = read_byte(reader)?
            .ok_or_else(|| ProtocolError::PacketFraming("missing packet size".into()))?;

        let mut data = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < data.len() {
            match reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProtocolError::PacketFraming(e.to_string())),
            }
        }
        data.truncate(filled);

        let actual = read_byte(reader)?
            .ok_or_else(|| ProtocolError::PacketFraming("missing checksum".into()))?;

        if data.len() != size as usize {
            return Err(ProtocolError::PacketFraming(format!(
                "size byte says {} bytes, got {}",
                size,
                data.len()
            )));
        }

        let packet_type = PacketType::try_from(packet_type)?;
        let expected = checksum(&data);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(Self { packet_type, data })
    }
}

impl EncodeCommand for Packet {
    fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(PACKET_HEADER_LEN + self.data.len() + 1);
        frame.push(self.packet_type as u8);
        frame.push(self.data.len() as u8);
        frame.extend_from_slice(&self.data);
        frame.push(self.checksum());
        frame
    }
}

fn read_byte<R: Read>(reader: &mut R) -> Result<Option<u8>, ProtocolError> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::PacketFraming(e.to_string())),
        }
    }
}

/// Identifies the kind of address being used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressKind {
    /// All connected monitors; the address number must be zero
    All = 0xC0,
    /// A monitor group; the address number is the group number
    Group = 0x80,
    /// A single monitor; the address number is the monitor number
    Monitor = 0x00,
}

impl TryFrom<u8> for AddressKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & ADDRESS_KIND_MASK {
            0xC0 => Ok(Self::All),
            0x80 => Ok(Self::Group),
            0x00 => Ok(Self::Monitor),
            other => Err(ProtocolError::CommandBlockMalformed(format!(
                "unknown address kind 0x{:02X}",
                other
            ))),
        }
    }
}

/// Source or destination of a command block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    kind: AddressKind,
    number: u8,
}

impl Address {
    /// Create an address, validating the number against the kind
    pub fn new(kind: AddressKind, number: u8) -> Result<Self, ProtocolError> {
        if number > MAX_ADDRESS_NUMBER {
            return Err(ProtocolError::OutOfRange(format!(
                "address number {} exceeds {}",
                number, MAX_ADDRESS_NUMBER
            )));
        }
        if kind == AddressKind::All && number != 0 {
            return Err(ProtocolError::OutOfRange(format!(
                "broadcast address must use number 0, got {}",
                number
            )));
        }
        Ok(Self { kind, number })
    }

    /// Broadcast to all monitors
    pub fn all() -> Self {
        Self {
            kind: AddressKind::All,
            number: 0,
        }
    }

    /// Address a monitor group
    pub fn group(group: u8) -> Result<Self, ProtocolError> {
        Self::new(AddressKind::Group, group)
    }

    /// Address a single monitor
    pub fn monitor(monitor: u8) -> Result<Self, ProtocolError> {
        Self::new(AddressKind::Monitor, monitor)
    }

    /// The address kind
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The address number
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Pack into the raw address byte
    pub fn pack(&self) -> u8 {
        self.kind as u8 | self.number
    }

    /// Parse a raw address byte
    pub fn unpack(raw: u8) -> Result<Self, ProtocolError> {
        let kind = AddressKind::try_from(raw)?;
        Ok(Self {
            kind,
            number: raw & MAX_ADDRESS_NUMBER,
        })
    }
}

/// Command codes understood by the monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Select the input channel (0x2100)
    SetChannel,
    /// Power the monitor on (0x293E)
    PowerOn,
    /// Power the monitor off (0x293F)
    PowerOff,
    /// Control module button press (0x3F44)
    Button,
    /// Any other command code
    Other(u16),
}

impl Command {
    /// The 16-bit wire code
    pub fn code(&self) -> u16 {
        match self {
            Command::SetChannel => 0x2100,
            Command::PowerOn => 0x293E,
            Command::PowerOff => 0x293F,
            Command::Button => 0x3F44,
            Command::Other(code) => *code,
        }
    }
}

impl From<u16> for Command {
    fn from(code: u16) -> Self {
        match code {
            0x2100 => Command::SetChannel,
            0x293E => Command::PowerOn,
            0x293F => Command::PowerOff,
            0x3F44 => Command::Button,
            other => Command::Other(other),
        }
    }
}

/// An addressed command, carried as a packet's data field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandBlock {
    /// Destination address
    pub destination: Address,
    /// Source address
    pub source: Address,
    /// Command code
    pub command: Command,
    /// First argument, if any
    pub arg0: Option<u8>,
    /// Second argument, only written when `arg0` is present
    pub arg1: Option<u8>,
}

impl CommandBlock {
    /// Create a command block without arguments
    pub fn new(destination: Address, source: Address, command: Command) -> Self {
        Self {
            destination,
            source,
            command,
            arg0: None,
            arg1: None,
        }
    }

    /// Set only the first argument
    pub fn with_arg0(mut self, arg0: u8) -> Self {
        self.arg0 = Some(arg0);
        self
    }

    /// Set both arguments
    pub fn with_args(mut self, arg0: u8, arg1: u8) -> Self {
        self.arg0 = Some(arg0);
        self.arg1 = Some(arg1);
        self
    }

    /// Serialize to the packet data field
    pub fn to_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(6);
        data.push(self.destination.pack());
        data.push(self.source.pack());
        data.extend_from_slice(&self.command.code().to_be_bytes());
        if let Some(arg0) = self.arg0 {
            data.push(arg0);
            if let Some(arg1) = self.arg1 {
                data.push(arg1);
            }
        }
        data
    }

    /// Wrap in a transport control packet
    pub fn to_packet(&self) -> Packet {
        // At most six bytes, always within the size byte
        Packet {
            packet_type: PacketType::TransportControl,
            data: self.to_data(),
        }
    }

    /// Parse a command block from a packet data field
    pub fn from_data(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < MIN_COMMAND_BLOCK_LEN {
            return Err(ProtocolError::CommandBlockMalformed(format!(
                "need at least {} bytes, got {}",
                MIN_COMMAND_BLOCK_LEN,
                data.len()
            )));
        }

        let destination = Address::unpack(data[0])?;
        let source = Address::unpack(data[1])?;
        let command = Command::from(u16::from_be_bytes([data[2], data[3]]));

        Ok(Self {
            destination,
            source,
            command,
            arg0: data.get(4).copied(),
            arg1: data.get(5).copied(),
        })
    }

    /// Parse a command block from a packet
    pub fn from_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        Self::from_data(packet.data())
    }
}

impl EncodeCommand for CommandBlock {
    fn encode(&self) -> Vec<u8> {
        self.to_packet().encode()
    }
}

/// Streaming packet codec yielding command blocks
#[derive(Debug)]
pub struct SonyCodec {
    buffer: Vec<u8>,
}

impl SonyCodec {
    /// Create a new packet codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }
}

impl Default for SonyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for SonyCodec {
    type Command = CommandBlock;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        loop {
            // Skip to something that looks like a packet type
            let start = self
                .buffer
                .iter()
                .position(|&b| b == PacketType::TransportControl as u8)
                .unwrap_or(self.buffer.len());
            self.buffer.drain(..start);

            if self.buffer.len() < PACKET_HEADER_LEN {
                return None;
            }
            let frame_len = PACKET_HEADER_LEN + self.buffer[1] as usize + 1;
            if self.buffer.len() < frame_len {
                return None;
            }

            let frame = &self.buffer[..frame_len];
            let parsed = Packet::decode(frame).and_then(|p| CommandBlock::from_packet(&p));
            match parsed {
                Ok(block) => {
                    let raw: Vec<u8> = self.buffer.drain(..frame_len).collect();
                    return Some((block, raw));
                }
                Err(e) => {
                    tracing::warn!("Failed to parse Sony packet: {}", e);
                    self.buffer.drain(..1);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SET_CHANNEL_10: [u8; 6] = [0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A];

    #[test]
    fn test_checksum_reference_packet() {
        let expected = (!(0xC0u32 + 0xC0 + 0x21 + 0x00 + 0x01 + 0x0A) & 0xFF) - 5;
        assert_eq!(checksum(&SET_CHANNEL_10) as u32, expected);
        assert_eq!(checksum(&SET_CHANNEL_10), 0x4E);
    }

    #[test]
    fn test_encode_set_channel_packet() {
        let block = CommandBlock::new(Address::all(), Address::all(), Command::SetChannel)
            .with_args(1, 10);
        assert_eq!(block.to_data(), SET_CHANNEL_10.to_vec());
        assert_eq!(
            block.encode(),
            vec![0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A, 0x4E]
        );
    }

    #[test]
    fn test_encode_power_on_has_no_args() {
        let block = CommandBlock::new(Address::all(), Address::all(), Command::PowerOn);
        let packet = block.encode();
        assert_eq!(&packet[..6], &[0x02, 0x04, 0xC0, 0xC0, 0x29, 0x3E]);
        assert_eq!(packet.len(), 7);
    }

    #[test]
    fn test_decode_packet() {
        let bytes = [0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A, 0x4E];
        let packet = Packet::decode(&bytes).unwrap();
        assert_eq!(packet.packet_type(), PacketType::TransportControl);
        assert_eq!(packet.data(), &SET_CHANNEL_10);

        let block = CommandBlock::from_packet(&packet).unwrap();
        assert_eq!(block.command, Command::SetChannel);
        assert_eq!(block.arg0, Some(1));
        assert_eq!(block.arg1, Some(10));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let bytes = [0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A, 0x6F];
        assert_eq!(
            Packet::decode(&bytes),
            Err(ProtocolError::ChecksumMismatch {
                expected: 0x4E,
                actual: 0x6F
            })
        );
    }

    #[test]
    fn test_decode_empty_stream() {
        assert!(matches!(
            Packet::decode(&[]),
            Err(ProtocolError::PacketFraming(_))
        ));
    }

    #[test]
    fn test_decode_missing_size() {
        assert!(matches!(
            Packet::decode(&[0x02]),
            Err(ProtocolError::PacketFraming(_))
        ));
    }

    #[test]
    fn test_decode_missing_checksum() {
        assert!(matches!(
            Packet::decode(&[0x02, 0x02, 0xC0, 0xC0]),
            Err(ProtocolError::PacketFraming(_))
        ));
    }

    #[test]
    fn test_decode_truncated_data() {
        // Size says 6, stream ends after 3 data bytes
        assert!(matches!(
            Packet::decode(&[0x02, 0x06, 0xC0, 0xC0, 0x21]),
            Err(ProtocolError::PacketFraming(_))
        ));
    }

    #[test]
    fn test_decode_unknown_packet_type() {
        let data = [0xC0, 0xC0, 0x29, 0x3E];
        let mut bytes = vec![0x07, 0x04];
        bytes.extend_from_slice(&data);
        bytes.push(checksum(&data));
        assert!(matches!(
            Packet::decode(&bytes),
            Err(ProtocolError::PacketFraming(_))
        ));
    }

    /// Reader that hands out one byte per call
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_read_tolerates_short_reads() {
        let bytes = [0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A, 0x4E];
        let packet = Packet::read_from(&mut Trickle(&bytes)).unwrap();
        assert_eq!(packet.data(), &SET_CHANNEL_10);
    }

    #[test]
    fn test_command_block_too_short() {
        assert!(matches!(
            CommandBlock::from_data(&[0xC0, 0xC0, 0x21]),
            Err(ProtocolError::CommandBlockMalformed(_))
        ));
    }

    #[test]
    fn test_arg0_only_truncation() {
        let block =
            CommandBlock::new(Address::all(), Address::all(), Command::SetChannel).with_arg0(1);
        let data = block.to_data();
        assert_eq!(data.len(), 5);

        let back = CommandBlock::from_data(&data).unwrap();
        assert_eq!(back.arg0, Some(1));
        assert_eq!(back.arg1, None);
    }

    #[test]
    fn test_arg1_without_arg0_is_not_written() {
        let mut block = CommandBlock::new(Address::all(), Address::all(), Command::Button);
        block.arg1 = Some(9);
        assert_eq!(block.to_data().len(), 4);
    }

    #[test]
    fn test_unknown_command_preserved() {
        let block = CommandBlock::from_data(&[0x00, 0xC0, 0x12, 0x34]).unwrap();
        assert_eq!(block.command, Command::Other(0x1234));
        assert_eq!(block.command.code(), 0x1234);
    }

    #[test]
    fn test_address_validation() {
        assert!(Address::new(AddressKind::All, 1).is_err());
        assert!(Address::monitor(32).is_err());
        assert_eq!(Address::group(3).unwrap().pack(), 0x83);
        assert_eq!(Address::monitor(31).unwrap().pack(), 0x1F);
        assert!(Address::unpack(0x40).is_err());
    }

    #[test]
    fn test_streaming_codec_resyncs_after_garbage() {
        let mut codec = SonyCodec::new();
        let good = CommandBlock::new(Address::all(), Address::all(), Command::PowerOff).encode();

        codec.push_bytes(&[0xFF, 0x02, 0x04, 0xC0, 0xC0, 0x29, 0x3F, 0x00]);
        codec.push_bytes(&good[..3]);
        assert!(codec.next_command().is_none());

        codec.push_bytes(&good[3..]);
        let (block, raw) = codec.next_command_with_bytes().unwrap();
        assert_eq!(block.command, Command::PowerOff);
        assert_eq!(raw, good);
        assert!(codec.next_command().is_none());
    }

    fn address_strategy() -> impl Strategy<Value = Address> {
        prop_oneof![
            Just(Address::all()),
            (0u8..=31).prop_map(|n| Address::new(AddressKind::Group, n).unwrap()),
            (0u8..=31).prop_map(|n| Address::new(AddressKind::Monitor, n).unwrap()),
        ]
    }

    proptest! {
        #[test]
        fn prop_packet_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..=255)) {
            let packet = Packet::new(PacketType::TransportControl, data.clone()).unwrap();
            let decoded = Packet::decode(&packet.encode()).unwrap();
            prop_assert_eq!(decoded.data(), data.as_slice());
        }

        #[test]
        fn prop_flipped_checksum_fails(
            data in proptest::collection::vec(any::<u8>(), 0..=32),
            flip in 1u8..=255,
        ) {
            let packet = Packet::new(PacketType::TransportControl, data).unwrap();
            let mut bytes = packet.encode();
            let last = bytes.len() - 1;
            bytes[last] ^= flip;
            let is_checksum_error = matches!(
                Packet::decode(&bytes),
                Err(ProtocolError::ChecksumMismatch { .. })
            );
            prop_assert!(is_checksum_error);
        }

        #[test]
        fn prop_address_roundtrip(address in address_strategy()) {
            prop_assert_eq!(Address::unpack(address.pack()).unwrap(), address);
        }

        #[test]
        fn prop_command_block_roundtrip(
            destination in address_strategy(),
            source in address_strategy(),
            code in any::<u16>(),
            arg0 in proptest::option::of(any::<u8>()),
            arg1 in any::<u8>(),
        ) {
            let mut block = CommandBlock::new(destination, source, Command::from(code));
            block.arg0 = arg0;
            block.arg1 = arg0.map(|_| arg1);
            let back = CommandBlock::from_packet(&Packet::decode(&block.encode()).unwrap()).unwrap();
            prop_assert_eq!(back, block);
        }
    }
}
