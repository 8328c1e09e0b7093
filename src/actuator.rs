//! Per-channel relay actuator state machine.
//!
//! ```text
//!          press                 release               grace elapsed
//!  Idle ─────────────▶ Held ─────────────▶ DeactivatingGrace ─────────▶ Idle
//!   ▲                                                                    │
//!   └──────────────────────── force_idle (from anywhere) ────────────────┘
//! ```
//!
//! The actuator only tracks state and enablement. Timers, group locks and
//! link writes are driven by the [`RelayService`](crate::app::service::RelayService),
//! which calls these transitions and acts on what they return.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::{Channel, Opcode};

/// How a control drives its relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonBehavior {
    /// Press-and-hold: heartbeat while down, deactivate on release.
    Hold,
    /// Click flips the relay between closed and open.
    Toggle,
}

/// Lifecycle state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorState {
    Idle,
    Held,
    DeactivatingGrace,
}

/// Why a UI event was ignored. Never an error; logged at debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Misuse {
    /// The control is not interactable right now.
    Disabled,
    /// Press while already held.
    AlreadyHeld,
    /// Release without a matching press (or heartbeat).
    NotHeld,
    /// Press while the previous release is still settling.
    InGrace,
    /// Hold event on a toggle control or click on a hold control.
    WrongBehavior,
    /// A sibling holds the group.
    GroupLocked,
}

impl fmt::Display for Misuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Disabled => "control disabled",
            Self::AlreadyHeld => "already held",
            Self::NotHeld => "not held",
            Self::InGrace => "deactivation grace in progress",
            Self::WrongBehavior => "event does not match control behavior",
            Self::GroupLocked => "group locked by a sibling",
        };
        f.write_str(msg)
    }
}

/// One relay channel bound to one UI control.
#[derive(Debug, Clone)]
pub struct ChannelActuator {
    source: String,
    channel: Channel,
    behavior: ButtonBehavior,
    /// Index of the owning group in the registry.
    group: Option<usize>,
    state: ActuatorState,
    /// Global enable flag, set by the registry sweep.
    enabled: bool,
    /// Sibling that currently holds our group.
    locked_by: Option<Channel>,
    /// Toggle position. Always `false` for hold controls.
    closed: bool,
    /// Last enablement pushed to the UI.
    reported_enabled: bool,
    /// Last activation pushed to the UI.
    reported_active: bool,
}

impl ChannelActuator {
    pub fn new(
        source: impl Into<String>,
        channel: Channel,
        behavior: ButtonBehavior,
        group: Option<usize>,
    ) -> Self {
        Self {
            source: source.into(),
            channel,
            behavior,
            group,
            state: ActuatorState::Idle,
            enabled: true,
            locked_by: None,
            closed: false,
            reported_enabled: true,
            reported_active: false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn behavior(&self) -> ButtonBehavior {
        self.behavior
    }

    pub fn group(&self) -> Option<usize> {
        self.group
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn locked_by(&self) -> Option<Channel> {
        self.locked_by
    }

    /// Whether the control is interactable: globally enabled, not locked
    /// by a sibling and not settling after a release.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.locked_by.is_none() && self.state != ActuatorState::DeactivatingGrace
    }

    /// Whether the relay is (believed to be) energised.
    pub fn is_active(&self) -> bool {
        self.state == ActuatorState::Held || self.closed
    }

    // ── Enablement ────────────────────────────────────────────

    /// Set the global enable flag. A settling channel stays disabled until
    /// its grace elapses regardless.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn lock(&mut self, by: Channel) {
        self.locked_by = Some(by);
    }

    /// Clear the lock if `by` set it.
    pub(crate) fn unlock(&mut self, by: Channel) -> bool {
        if self.locked_by == Some(by) {
            self.locked_by = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn clear_lock(&mut self) {
        self.locked_by = None;
    }

    // ── Transitions ───────────────────────────────────────────

    /// `Idle → Held`.
    pub fn press(&mut self) -> Result<(), Misuse> {
        if self.behavior != ButtonBehavior::Hold {
            return Err(Misuse::WrongBehavior);
        }
        match self.state {
            ActuatorState::Held => return Err(Misuse::AlreadyHeld),
            ActuatorState::DeactivatingGrace => return Err(Misuse::InGrace),
            ActuatorState::Idle => {}
        }
        if self.locked_by.is_some() {
            return Err(Misuse::GroupLocked);
        }
        if !self.enabled {
            return Err(Misuse::Disabled);
        }
        self.state = ActuatorState::Held;
        Ok(())
    }

    /// `Held → DeactivatingGrace`. The caller checks the heartbeat.
    pub fn release(&mut self) -> Result<(), Misuse> {
        if self.behavior != ButtonBehavior::Hold {
            return Err(Misuse::WrongBehavior);
        }
        if self.state != ActuatorState::Held {
            return Err(Misuse::NotHeld);
        }
        self.state = ActuatorState::DeactivatingGrace;
        Ok(())
    }

    /// `DeactivatingGrace → Idle`. Returns `false` if the channel was not settling.
    pub fn grace_elapsed(&mut self) -> bool {
        if self.state == ActuatorState::DeactivatingGrace {
            self.state = ActuatorState::Idle;
            true
        } else {
            false
        }
    }

    /// Flip a toggle control and return the opcode to send.
    pub fn click(&mut self) -> Result<Opcode, Misuse> {
        if self.behavior != ButtonBehavior::Toggle {
            return Err(Misuse::WrongBehavior);
        }
        if self.locked_by.is_some() {
            return Err(Misuse::GroupLocked);
        }
        if !self.is_enabled() {
            return Err(Misuse::Disabled);
        }
        self.closed = !self.closed;
        Ok(if self.closed { Opcode::Close } else { Opcode::Open })
    }

    /// Back to `Idle` from any state; toggles open.
    pub fn force_idle(&mut self) {
        self.state = ActuatorState::Idle;
        self.closed = false;
    }

    // ── UI change tracking ────────────────────────────────────

    /// Effective enablement if it differs from what the UI last saw.
    pub(crate) fn take_enabled_change(&mut self) -> Option<bool> {
        let now = self.is_enabled();
        (now != self.reported_enabled).then(|| {
            self.reported_enabled = now;
            now
        })
    }

    /// Activation if it differs from what the UI last saw.
    pub(crate) fn take_activation_change(&mut self) -> Option<bool> {
        let now = self.is_active();
        (now != self.reported_active).then(|| {
            self.reported_active = now;
            now
        })
    }
}
