//! Relay board command codec.
//!
//! Wire format (ASCII, one command per line):
//! ```text
//! ┌─────────┬────────┬──────────┐
//! │ Channel │ Opcode │ "\r\n"   │
//! │ 1 byte  │ 1 digit│ 2 bytes  │
//! └─────────┴────────┴──────────┘
//! ```
//!
//! `A4\r\n` closes relay A, `A3\r\n` opens it, `A0\r\n` closes it for
//! one board-timed pulse (~1 s) after which the board opens it on its own.
//! The encoder never allocates; the [`LineDecoder`] tolerates partial
//! reads the same way a byte stream delivers them.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Labels the relay board understands, in board order.
pub const SUPPORTED_CHANNELS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

/// Upper bound on distinct channels (and therefore controls) per board.
pub const MAX_CHANNELS: usize = SUPPORTED_CHANNELS.len();

/// Encoded size of every command.
pub const COMMAND_LEN: usize = 4;

const TERMINATOR: [u8; 2] = *b"\r\n";

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// One physical relay output, addressed by its single-character label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel(u8);

impl Channel {
    /// Channel for `label`, if the board supports it.
    pub fn new(label: char) -> Result<Self, ConfigError> {
        if SUPPORTED_CHANNELS.contains(&label) {
            Ok(Self(label as u8))
        } else {
            Err(ConfigError::InvalidChannel(label))
        }
    }

    /// Parse a control tag. A tag must be exactly one supported label.
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        let mut chars = tag.chars();
        match (chars.next(), chars.next()) {
            (Some(label), None) if SUPPORTED_CHANNELS.contains(&label) => Ok(Self(label as u8)),
            _ => Err(ConfigError::UnsupportedTag(tag.to_string())),
        }
    }

    pub fn label(self) -> char {
        self.0 as char
    }

    /// Dense index in `0..MAX_CHANNELS`.
    pub fn index(self) -> usize {
        (self.0 - b'A') as usize
    }

    fn from_byte(byte: u8) -> Option<Self> {
        Self::new(byte as char).ok()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl TryFrom<String> for Channel {
    type Error = ConfigError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::from_tag(&tag)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// Board opcodes. The discriminant is the ASCII digit sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
    /// Momentary activate: the board closes the relay for one pulse.
    /// Resent continuously as the hold heartbeat.
    Heartbeat = 0,
    /// Board-side toggle. Not used by any control.
    Switch = 1,
    /// Board-side interlock. Reserved.
    Interlock = 2,
    /// Deactivate / open the relay.
    Open = 3,
    /// Activate / close the relay (latched until opened).
    Close = 4,
}

impl Opcode {
    pub const fn digit(self) -> u8 {
        b'0' + self as u8
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(Self::Heartbeat),
            b'1' => Some(Self::Switch),
            b'2' => Some(Self::Interlock),
            b'3' => Some(Self::Open),
            b'4' => Some(Self::Close),
            _ => None,
        }
    }

    /// True for opcodes that energise the relay.
    pub fn is_activation(self) -> bool {
        matches!(self, Self::Heartbeat | Self::Close)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single addressed board command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub channel: Channel,
    pub opcode: Opcode,
}

impl Command {
    pub fn new(channel: Channel, opcode: Opcode) -> Self {
        Self { channel, opcode }
    }

    /// Serialise to the exact byte string the board expects.
    pub fn encode(self) -> [u8; COMMAND_LEN] {
        [self.channel.0, self.opcode.digit(), TERMINATOR[0], TERMINATOR[1]]
    }

    /// Decode one complete, terminated command.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes {
            [label, digit, b'\r', b'\n'] => Self::decode_body(*label, *digit),
            [_, _, ..] if bytes.len() == COMMAND_LEN => Err(DecodeError::MissingTerminator),
            _ => Err(DecodeError::BadLength(bytes.len())),
        }
    }

    fn decode_body(label: u8, digit: u8) -> Result<Self, DecodeError> {
        let channel = Channel::from_byte(label).ok_or(DecodeError::UnknownChannel(label))?;
        let opcode = Opcode::from_digit(digit).ok_or(DecodeError::UnknownOpcode(digit))?;
        Ok(Self { channel, opcode })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.channel, self.opcode.digit() as char)
    }
}

/// Reasons a byte string is not a valid command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    BadLength(usize),
    MissingTerminator,
    UnknownChannel(u8),
    UnknownOpcode(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength(n) => write!(f, "expected {COMMAND_LEN} bytes, got {n}"),
            Self::MissingTerminator => write!(f, "missing CRLF terminator"),
            Self::UnknownChannel(b) => write!(f, "unknown channel byte 0x{b:02x}"),
            Self::UnknownOpcode(b) => write!(f, "unknown opcode byte 0x{b:02x}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming decoder
// ---------------------------------------------------------------------------

/// Longest garbage line kept before the decoder gives up on it.
const MAX_LINE: usize = 16;

/// Splits a byte stream on line endings and decodes each line.
///
/// A lone `\r` or `\n` ends a line, so `\r\n` never yields an empty
/// command. Over-long lines are reported once and then discarded up to
/// the next line ending.
pub struct LineDecoder {
    line: heapless::Vec<u8, MAX_LINE>,
    overflowed: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            line: heapless::Vec::new(),
            overflowed: false,
        }
    }

    /// Feed one byte. Returns a result whenever a non-empty line completes.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Command, DecodeError>> {
        if byte == b'\r' || byte == b'\n' {
            let overflowed = core::mem::replace(&mut self.overflowed, false);
            if self.line.is_empty() && !overflowed {
                return None;
            }
            let res = if overflowed {
                Err(DecodeError::BadLength(MAX_LINE + 1))
            } else {
                match self.line.as_slice() {
                    [label, digit] => Command::decode_body(*label, *digit),
                    other => Err(DecodeError::BadLength(other.len() + TERMINATOR.len())),
                }
            };
            self.line.clear();
            return Some(res);
        }
        if self.line.push(byte).is_err() {
            self.overflowed = true;
            self.line.clear();
        }
        None
    }

    /// Feed a buffer and collect every completed line.
    pub fn feed_all(&mut self, data: &[u8]) -> Vec<Result<Command, DecodeError>> {
        data.iter().filter_map(|b| self.feed(*b)).collect()
    }

    /// Drop any partial line (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}
