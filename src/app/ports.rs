//! Port traits: the hexagonal boundary between the engine and the outside world.
//!
//! ```text
//!   UI events ──▶ RelayService ──▶ ConnectionGate ──▶ LinkPort
//!                      │
//!                      └──▶ UiPort (enable / activation feedback)
//! ```
//!
//! Adapters (serial device, UI toolkit, wall clock) implement these traits.
//! The [`RelayService`](super::service::RelayService) consumes them via
//! generics, so the engine never touches a device or a widget directly.

use serde::Serialize;

use crate::error::LinkError;
use crate::protocol::Channel;

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: engine → relay board)
// ───────────────────────────────────────────────────────────────

/// Link connection status. Owned by the link; the engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Byte-oriented link to the relay board.
///
/// Only the [`ConnectionGate`](crate::gate::ConnectionGate) calls `write`.
pub trait LinkPort {
    /// Write one encoded command. Must not block for long.
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Current connection status.
    fn state(&self) -> ConnectionState;

    /// Open the link to `target` (device path or address).
    fn connect(&mut self, target: &str) -> Result<(), LinkError>;

    /// Close the link. Closing an already closed link is a no-op.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// UI port (driven adapter: engine → presentation)
// ───────────────────────────────────────────────────────────────

/// Affordance feedback for the presentation layer.
///
/// Called only when a value actually changes.
pub trait UiPort {
    /// The control bound to `channel` became (un)interactable.
    fn on_enabled_changed(&mut self, channel: Channel, enabled: bool);

    /// The relay on `channel` was activated or deactivated.
    fn on_activation_changed(&mut self, channel: Channel, active: bool);

    /// The link moved to `state`.
    fn on_connection_changed(&mut self, _state: ConnectionState) {}
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn uptime_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples the scheduler from the engine)
// ───────────────────────────────────────────────────────────────

/// Callback trait the [`HeartbeatScheduler`](crate::scheduler::HeartbeatScheduler)
/// invokes for every due timer.
///
/// The service implements it with a small queue that it drains after the
/// scheduler returns, so the scheduler knows nothing about actuators.
pub trait SchedulerDelegate {
    fn on_timer_fired(&mut self, channel: Channel, fired: TimerFired);
}

/// What fired, passed to [`SchedulerDelegate::on_timer_fired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    /// A periodic heartbeat tick. `tick == 0` is the press itself.
    Heartbeat { tick: u32 },
    /// The one-shot grace timer after a release elapsed.
    GraceElapsed,
}
