//! Mutual exclusion groups.
//!
//! At most one member of a group may be energised. The member that takes
//! the lock is the only one allowed to release it: a held channel once its
//! grace period has run out, a toggle when it is clicked open.

use log::debug;

use crate::error::ConfigError;
use crate::protocol::{Channel, MAX_CHANNELS};

#[derive(Debug, Clone)]
pub struct MutualExclusionGroup {
    name: String,
    members: heapless::Vec<Channel, MAX_CHANNELS>,
    locked_by: Option<Channel>,
}

impl MutualExclusionGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: heapless::Vec::new(),
            locked_by: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, channel: Channel) -> Result<(), ConfigError> {
        if self.contains(channel) {
            return Err(ConfigError::DuplicateChannel(channel.label()));
        }
        self.members
            .push(channel)
            .map_err(|_| ConfigError::CapacityExceeded)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.members.contains(&channel)
    }

    pub fn members(&self) -> &[Channel] {
        &self.members
    }

    /// Every member except `channel`.
    pub fn siblings(&self, channel: Channel) -> impl Iterator<Item = Channel> + '_ {
        self.members.iter().copied().filter(move |c| *c != channel)
    }

    pub fn locked_by(&self) -> Option<Channel> {
        self.locked_by
    }

    /// Take the lock for `initiator`. Fails if a different member holds it.
    pub fn lock(&mut self, initiator: Channel) -> bool {
        match self.locked_by {
            Some(holder) if holder != initiator => false,
            _ => {
                debug!("Group '{}': locked by {}", self.name, initiator);
                self.locked_by = Some(initiator);
                true
            }
        }
    }

    /// Release the lock. Only the member that took it may release it.
    pub fn unlock(&mut self, initiator: Channel) -> bool {
        if self.locked_by == Some(initiator) {
            debug!("Group '{}': unlocked by {}", self.name, initiator);
            self.locked_by = None;
            true
        } else {
            false
        }
    }

    /// Drop the lock regardless of holder (deactivate-all sweep).
    pub fn reset(&mut self) {
        self.locked_by = None;
    }
}
