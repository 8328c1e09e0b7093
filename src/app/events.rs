//! Outbound state snapshots.
//!
//! The [`RelayService`](super::service::RelayService) builds these on
//! demand. They serialise to JSON for diagnostics and make test
//! assertions read naturally.

use serde::Serialize;

use crate::actuator::{ActuatorState, ButtonBehavior};
use crate::gate::GateStats;
use crate::protocol::Channel;

use super::ports::ConnectionState;

/// A point-in-time view of the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub link: ConnectionState,
    pub enabled_all: bool,
    pub gate: GateStats,
    /// Timers armed in the scheduler.
    pub active_timers: usize,
    pub channels: Vec<ChannelSnapshot>,
}

impl EngineSnapshot {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelSnapshot> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

/// One channel's state as the UI would see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub channel: Channel,
    pub source: String,
    pub behavior: ButtonBehavior,
    pub state: ActuatorState,
    pub enabled: bool,
    pub active: bool,
    pub locked_by: Option<Channel>,
    pub heartbeat: bool,
}
