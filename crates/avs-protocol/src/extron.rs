//! Extron SIS Protocol Implementation
//!
//! Extron matrix switches accept the Simple Instruction Set over RS-232 or
//! telnet. Only the tie commands are used here, one line per signal plane:
//!
//! ```text
//! {input}*{output}%    tie input to output, video only
//! {input}*{output}$    tie input to output, audio only
//! ```
//!
//! Each command line is terminated with CR LF. There is no checksum.

use crate::{EncodeCommand, ProtocolCodec};

/// Line terminator appended to every command
pub const TERMINATOR: &[u8] = b"\r\n";

/// Maximum line length kept while waiting for a terminator
const MAX_LINE_LEN: usize = 64;

/// Signal plane a tie applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TiePlane {
    /// Video only (`%`)
    Video,
    /// Audio only (`$`)
    Audio,
}

impl TiePlane {
    /// The SIS suffix character selecting this plane
    pub fn suffix(&self) -> char {
        match self {
            TiePlane::Video => '%',
            TiePlane::Audio => '$',
        }
    }

    fn from_suffix(c: char) -> Option<Self> {
        match c {
            '%' => Some(TiePlane::Video),
            '$' => Some(TiePlane::Audio),
            _ => None,
        }
    }
}

/// Parsed or to-be-sent SIS command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtronCommand {
    /// Tie an input to an output on one plane
    Tie {
        input: u32,
        output: u32,
        plane: TiePlane,
    },
    /// Any other line (preserved raw, without terminator)
    Unknown { line: String },
}

impl ExtronCommand {
    /// Create a video tie command
    pub fn video_tie(input: u32, output: u32) -> Self {
        Self::Tie {
            input,
            output,
            plane: TiePlane::Video,
        }
    }

    /// Create an audio tie command
    pub fn audio_tie(input: u32, output: u32) -> Self {
        Self::Tie {
            input,
            output,
            plane: TiePlane::Audio,
        }
    }

    /// Parse a single line (without terminator)
    pub fn parse_line(line: &str) -> Self {
        let unknown = || Self::Unknown {
            line: line.to_string(),
        };

        let Some(suffix) = line.chars().last() else {
            return unknown();
        };
        let Some(plane) = TiePlane::from_suffix(suffix) else {
            return unknown();
        };
        let body = &line[..line.len() - suffix.len_utf8()];
        let Some((input, output)) = body.split_once('*') else {
            return unknown();
        };

        match (input.parse(), output.parse()) {
            (Ok(input), Ok(output)) => Self::Tie {
                input,
                output,
                plane,
            },
            _ => unknown(),
        }
    }
}

impl EncodeCommand for ExtronCommand {
    fn encode(&self) -> Vec<u8> {
        let mut line = match self {
            ExtronCommand::Tie {
                input,
                output,
                plane,
            } => format!("{}*{}{}", input, output, plane.suffix()).into_bytes(),
            ExtronCommand::Unknown { line } => line.clone().into_bytes(),
        };
        line.extend_from_slice(TERMINATOR);
        line
    }
}

/// Encode the video and audio tie lines for one routing change
pub fn encode_tie(input: u32, video_output: u32, audio_output: u32) -> Vec<u8> {
    let mut bytes = ExtronCommand::video_tie(input, video_output).encode();
    bytes.extend(ExtronCommand::audio_tie(input, audio_output).encode());
    bytes
}

/// Streaming SIS line codec
#[derive(Debug)]
pub struct ExtronCodec {
    buffer: Vec<u8>,
}

impl ExtronCodec {
    /// Create a new SIS codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_LINE_LEN),
        }
    }
}

impl Default for ExtronCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for ExtronCodec {
    type Command = ExtronCommand;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth from a line that never terminates
        if self.buffer.len() > MAX_LINE_LEN * 4 {
            let start = self.buffer.len() - MAX_LINE_LEN;
            self.buffer.drain(..start);
        }
    }

    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\r' || b == b'\n')?;
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();

            // Swallow the LF of a CR LF pair
            if raw.last() == Some(&b'\r') && self.buffer.first() == Some(&b'\n') {
                self.buffer.remove(0);
            }

            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            if line.is_empty() {
                continue;
            }
            return Some((ExtronCommand::parse_line(&line), raw));
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}
