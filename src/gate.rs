//! Connection gate: the only writer to the link.
//!
//! Every command is checked against the link state immediately before it
//! is written. Not being connected is normal (the UI may be fiddled with
//! before a device is picked) so those sends are dropped silently; write
//! failures are logged and counted but never retried, because the next
//! heartbeat supersedes a lost one.

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{ConnectionState, LinkPort};
use crate::error::LinkError;
use crate::protocol::Command;

/// Send counters since the gate was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub sent: u64,
    pub dropped_not_connected: u64,
    pub write_failures: u64,
}

pub struct ConnectionGate<L: LinkPort> {
    link: L,
    stats: GateStats,
}

impl<L: LinkPort> ConnectionGate<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            stats: GateStats::default(),
        }
    }

    /// Write `command` if the link is connected. Returns whether it went out.
    pub fn send(&mut self, command: Command) -> bool {
        if !self.link.state().is_connected() {
            self.stats.dropped_not_connected += 1;
            debug!("Gate: {} dropped, not connected", command);
            return false;
        }
        match self.link.write(&command.encode()) {
            Ok(()) => {
                self.stats.sent += 1;
                debug!("Gate: {} sent", command);
                true
            }
            Err(e) => {
                self.stats.write_failures += 1;
                warn!("Gate: {} write failed: {}", command, e);
                false
            }
        }
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn connect(&mut self, target: &str) -> Result<(), LinkError> {
        info!("Gate: connecting to {}", target);
        self.link.connect(target)
    }

    pub fn disconnect(&mut self) {
        info!("Gate: disconnecting");
        self.link.disconnect();
    }

    pub fn stats(&self) -> GateStats {
        self.stats
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}
