//! Inbound commands to the relay service.
//!
//! These represent actions requested by the outside world (UI widgets,
//! link callbacks, lifecycle hooks) that the
//! [`RelayService`](super::service::RelayService) interprets and acts upon.
//! The [`Controller`](crate::runtime::Controller) queues them across threads.

use super::ports::ConnectionState;

/// Commands that adapters can send into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// A hold control went down.
    Press { source: String },

    /// A hold control came up.
    Release { source: String },

    /// A toggle control was clicked.
    Click { source: String },

    /// Deactivate one channel immediately, whatever its state.
    ForceDeactivate { source: String },

    /// Enable or disable every control (e.g. when no device is selected).
    SetEnabledAll(bool),

    /// Send deactivate to every channel and reset them all.
    DeactivateAll,

    /// The link reported a new connection state.
    LinkStateChanged(ConnectionState),

    /// Open the link to a device.
    Connect(String),

    /// Deactivate everything, then close the link.
    Disconnect,
}

impl ControlCommand {
    pub fn press(source: impl Into<String>) -> Self {
        Self::Press {
            source: source.into(),
        }
    }

    pub fn release(source: impl Into<String>) -> Self {
        Self::Release {
            source: source.into(),
        }
    }

    pub fn click(source: impl Into<String>) -> Self {
        Self::Click {
            source: source.into(),
        }
    }
}
