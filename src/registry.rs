//! Actuator registry: owns every channel actuator and every group.
//!
//! Built once from a [`BoardLayout`] (or by hand through
//! [`RegistryBuilder`]); all layout mistakes surface from
//! [`RegistryBuilder::build`] as a typed [`ConfigError`].

use log::{debug, info};

use crate::actuator::{ButtonBehavior, ChannelActuator};
use crate::config::BoardLayout;
use crate::error::ConfigError;
use crate::group::MutualExclusionGroup;
use crate::protocol::{Channel, MAX_CHANNELS};

// ───────────────────────────────────────────────────────────────
// Builder
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingControl {
    source: String,
    tag: String,
    behavior: ButtonBehavior,
    group: Option<String>,
}

/// Collects control registrations and validates them in one go.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    pending: Vec<PendingControl>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every control of a parsed layout.
    pub fn from_layout(layout: &BoardLayout) -> Self {
        let mut builder = Self::new();
        for binding in &layout.controls {
            builder.push(
                binding.source.clone(),
                binding.channel.label().to_string(),
                binding.behavior,
                binding.group.clone(),
            );
        }
        builder
    }

    /// Register a press-and-hold control on the channel named by `tag`.
    pub fn register_hold(
        &mut self,
        source: impl Into<String>,
        tag: &str,
        group: Option<&str>,
    ) -> &mut Self {
        self.push(source.into(), tag.to_string(), ButtonBehavior::Hold, group.map(str::to_string));
        self
    }

    /// Register a toggle control. A toggle in a group locks it while
    /// closed and unlocks it when clicked open again.
    pub fn register_toggle(
        &mut self,
        source: impl Into<String>,
        tag: &str,
        group: Option<&str>,
    ) -> &mut Self {
        self.push(source.into(), tag.to_string(), ButtonBehavior::Toggle, group.map(str::to_string));
        self
    }

    fn push(&mut self, source: String, tag: String, behavior: ButtonBehavior, group: Option<String>) {
        self.pending.push(PendingControl {
            source,
            tag,
            behavior,
            group,
        });
    }

    pub fn build(&self) -> Result<ActuatorRegistry, ConfigError> {
        let mut registry = ActuatorRegistry {
            actuators: heapless::Vec::new(),
            groups: heapless::Vec::new(),
            enabled: true,
        };

        for control in &self.pending {
            let channel = Channel::from_tag(&control.tag)?;
            if registry.actuators.iter().any(|a| a.source() == control.source) {
                return Err(ConfigError::DuplicateSource(control.source.clone()));
            }
            if registry.get(channel).is_some() {
                return Err(ConfigError::DuplicateChannel(channel.label()));
            }

            let group = match &control.group {
                Some(name) => Some(registry.join_group(name, channel)?),
                None => None,
            };

            registry
                .actuators
                .push(ChannelActuator::new(
                    control.source.clone(),
                    channel,
                    control.behavior,
                    group,
                ))
                .map_err(|_| ConfigError::CapacityExceeded)?;
            debug!(
                "Registry: '{}' -> {} ({:?}, group {:?})",
                control.source, channel, control.behavior, control.group
            );
        }

        info!(
            "Registry: {} control(s), {} group(s)",
            registry.actuators.len(),
            registry.groups.len()
        );
        Ok(registry)
    }
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

pub struct ActuatorRegistry {
    actuators: heapless::Vec<ChannelActuator, MAX_CHANNELS>,
    groups: heapless::Vec<MutualExclusionGroup, MAX_CHANNELS>,
    enabled: bool,
}

impl ActuatorRegistry {
    fn join_group(&mut self, name: &str, channel: Channel) -> Result<usize, ConfigError> {
        let idx = match self.groups.iter().position(|g| g.name() == name) {
            Some(idx) => idx,
            None => {
                self.groups
                    .push(MutualExclusionGroup::new(name))
                    .map_err(|_| ConfigError::CapacityExceeded)?;
                self.groups.len() - 1
            }
        };
        self.groups[idx].add(channel)?;
        Ok(idx)
    }

    // ── Lookup ────────────────────────────────────────────────

    /// Channel registered for the UI control `source`.
    pub fn lookup(&self, source: &str) -> Result<Channel, ConfigError> {
        self.actuators
            .iter()
            .find(|a| a.source() == source)
            .map(ChannelActuator::channel)
            .ok_or_else(|| ConfigError::NotFound(source.to_string()))
    }

    pub fn get(&self, channel: Channel) -> Option<&ChannelActuator> {
        self.actuators.iter().find(|a| a.channel() == channel)
    }

    pub fn get_mut(&mut self, channel: Channel) -> Option<&mut ChannelActuator> {
        self.actuators.iter_mut().find(|a| a.channel() == channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelActuator> {
        self.actuators.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelActuator> {
        self.actuators.iter_mut()
    }

    pub fn channels(&self) -> heapless::Vec<Channel, MAX_CHANNELS> {
        self.actuators.iter().map(ChannelActuator::channel).collect()
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    pub fn groups(&self) -> &[MutualExclusionGroup] {
        &self.groups
    }

    pub fn group_of(&self, channel: Channel) -> Option<&MutualExclusionGroup> {
        self.get(channel)
            .and_then(ChannelActuator::group)
            .and_then(|idx| self.groups.get(idx))
    }

    // ── Enablement ────────────────────────────────────────────

    /// Global enable/disable of every control (e.g. on device (dis)connect).
    pub fn set_enabled_all(&mut self, enabled: bool) {
        self.enabled = enabled;
        for actuator in &mut self.actuators {
            actuator.set_enabled(enabled);
        }
        info!("Registry: all controls {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled_all(&self) -> bool {
        self.enabled
    }

    // ── Group locking ─────────────────────────────────────────

    /// Lock `initiator`'s group and disable its siblings.
    ///
    /// Returns `false` if another member holds the group. A channel with no
    /// group always succeeds.
    pub fn lock_group(&mut self, initiator: Channel) -> bool {
        let Some(idx) = self.get(initiator).and_then(ChannelActuator::group) else {
            return true;
        };
        let Some(group) = self.groups.get_mut(idx) else {
            return true;
        };
        if !group.lock(initiator) {
            return false;
        }
        let siblings: heapless::Vec<Channel, MAX_CHANNELS> = group.siblings(initiator).collect();
        for sibling in siblings {
            if let Some(actuator) = self.get_mut(sibling) {
                actuator.lock(initiator);
            }
        }
        true
    }

    /// Unlock `initiator`'s group and re-enable its siblings.
    ///
    /// Only the member that locked the group can unlock it.
    pub fn unlock_group(&mut self, initiator: Channel) -> bool {
        let Some(idx) = self.get(initiator).and_then(ChannelActuator::group) else {
            return false;
        };
        let Some(group) = self.groups.get_mut(idx) else {
            return false;
        };
        if !group.unlock(initiator) {
            return false;
        }
        let siblings: heapless::Vec<Channel, MAX_CHANNELS> = group.siblings(initiator).collect();
        for sibling in siblings {
            if let Some(actuator) = self.get_mut(sibling) {
                actuator.unlock(initiator);
            }
        }
        true
    }

    /// Force every actuator back to `Idle` and release every group.
    ///
    /// Returns the channels in registration order so the caller can cancel
    /// their timers and send the deactivate commands.
    pub fn deactivate_all(&mut self) -> heapless::Vec<Channel, MAX_CHANNELS> {
        for group in &mut self.groups {
            group.reset();
        }
        for actuator in &mut self.actuators {
            actuator.force_idle();
            actuator.clear_lock();
        }
        self.channels()
    }
}
