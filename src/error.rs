//! Unified error types for the relay control engine.
//!
//! Only two things are genuine errors here: a board layout that cannot be
//! built (caught once, at startup) and a link that fails underneath us.
//! Out-of-order or duplicate UI events are *not* errors; they come back as
//! [`Outcome::Ignored`](crate::app::service::Outcome) instead.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible engine operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The board layout or engine configuration is invalid.
    Config(ConfigError),
    /// The serial link failed.
    Link(LinkError),
    /// A UI event named a control that was never registered.
    UnknownSource(String),
    /// The controller thread is no longer running.
    Stopped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::UnknownSource(source) => write!(f, "no channel registered for control '{source}'"),
            Self::Stopped => write!(f, "controller stopped"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Fatal configuration problems, surfaced when the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A channel label outside the supported set.
    InvalidChannel(char),
    /// A control tag that is not a single supported channel label.
    UnsupportedTag(String),
    /// Two controls registered under the same source id.
    DuplicateSource(String),
    /// Two controls bound to the same relay channel.
    DuplicateChannel(char),
    /// Lookup of a source id that was never registered.
    NotFound(String),
    /// More members than a group (or the registry) can hold.
    CapacityExceeded,
    /// A timing or layout field failed range validation.
    ValidationFailed(&'static str),
    /// The layout document could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(c) => write!(f, "channel '{c}' is not supported"),
            Self::UnsupportedTag(tag) => write!(f, "control tag '{tag}' is not supported"),
            Self::DuplicateSource(s) => write!(f, "control '{s}' registered twice"),
            Self::DuplicateChannel(c) => write!(f, "channel '{c}' bound to more than one control"),
            Self::NotFound(s) => write!(f, "control '{s}' not found"),
            Self::CapacityExceeded => write!(f, "too many controls"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Parse(msg) => write!(f, "layout parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`LinkPort`](crate::app::ports::LinkPort).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Write attempted while the link is down.
    NotConnected,
    /// The underlying device rejected the write.
    WriteFailed(String),
    /// Opening the device failed.
    OpenFailed(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::WriteFailed(msg) => write!(f, "write failed: {msg}"),
            Self::OpenFailed(msg) => write!(f, "open failed: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
