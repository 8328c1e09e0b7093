//! Relay service: the hexagonal core.
//!
//! [`RelayService`] owns the registry, the heartbeat scheduler and the
//! connection gate. Every transition and every timer callback runs through
//! `&mut self`, so there is exactly one writer and a cancelled heartbeat can
//! never tick again. Time is passed in as `now_ms`; the
//! [`Controller`](crate::runtime::Controller) supplies it from a clock.
//!
//! ```text
//!  UI events ──▶ ┌──────────────────────────────┐ ──▶ UiPort
//!                │         RelayService         │
//!  now_ms ─────▶ │ Registry · Scheduler · Gate  │ ──▶ LinkPort
//!                └──────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::actuator::{ActuatorState, ChannelActuator};
use crate::config::{BoardLayout, EngineConfig};
use crate::error::{Error, Result};
use crate::gate::{ConnectionGate, GateStats};
use crate::protocol::{Channel, Command, MAX_CHANNELS, Opcode};
use crate::registry::{ActuatorRegistry, RegistryBuilder};
use crate::scheduler::HeartbeatScheduler;

pub use crate::actuator::Misuse;

use super::commands::ControlCommand;
use super::events::{ChannelSnapshot, EngineSnapshot};
use super::ports::{ConnectionState, LinkPort, SchedulerDelegate, TimerFired, UiPort};

/// Result of a UI event that named a known control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(Misuse),
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Buffers scheduler fires so they can be dispatched once the scheduler
/// borrow ends.
#[derive(Default)]
struct FiredQueue(heapless::Vec<(Channel, TimerFired), { 2 * MAX_CHANNELS }>);

impl SchedulerDelegate for FiredQueue {
    fn on_timer_fired(&mut self, channel: Channel, fired: TimerFired) {
        if self.0.push((channel, fired)).is_err() {
            warn!("Service: timer queue full, dropped {:?} for {}", fired, channel);
        }
    }
}

fn ignored(channel: Channel, event: &str, misuse: Misuse) -> Outcome {
    debug!("Service: {} on {} ignored: {}", event, channel, misuse);
    Outcome::Ignored(misuse)
}

// ───────────────────────────────────────────────────────────────
// RelayService
// ───────────────────────────────────────────────────────────────

pub struct RelayService<L: LinkPort, U: UiPort> {
    config: EngineConfig,
    registry: ActuatorRegistry,
    scheduler: HeartbeatScheduler,
    gate: ConnectionGate<L>,
    ui: U,
    /// Link state the engine last acted on.
    link_state: ConnectionState,
}

impl<L: LinkPort, U: UiPort> RelayService<L, U> {
    pub fn new(config: EngineConfig, registry: ActuatorRegistry, link: L, ui: U) -> Result<Self> {
        config.validate()?;
        let link_state = link.state();
        info!(
            "RelayService: {} control(s), heartbeat {}ms, grace {}ms, link {:?}",
            registry.len(),
            config.heartbeat_period_ms,
            config.grace_period_ms,
            link_state
        );
        Ok(Self {
            scheduler: HeartbeatScheduler::new(config.heartbeat_period_ms),
            config,
            registry,
            gate: ConnectionGate::new(link),
            ui,
            link_state,
        })
    }

    /// Build the registry from `layout` and start a service over it.
    pub fn from_layout(layout: &BoardLayout, link: L, ui: U) -> Result<Self> {
        let registry = RegistryBuilder::from_layout(layout).build()?;
        Self::new(layout.engine.clone(), registry, link, ui)
    }

    // ── UI events ─────────────────────────────────────────────

    /// A hold control went down at `now_ms`.
    pub fn press(&mut self, source: &str, now_ms: u64) -> Result<Outcome> {
        let channel = self.resolve(source)?;
        self.poll(now_ms);

        let Some(actuator) = self.registry.get_mut(channel) else {
            return Err(Error::UnknownSource(source.to_string()));
        };
        if let Err(misuse) = actuator.press() {
            if misuse == Misuse::InGrace {
                warn!("Service: press on {} during grace ignored", channel);
            }
            return Ok(ignored(channel, "press", misuse));
        }
        if !self.registry.lock_group(channel) {
            if let Some(actuator) = self.registry.get_mut(channel) {
                actuator.force_idle();
            }
            return Ok(ignored(channel, "press", Misuse::GroupLocked));
        }
        if !self.scheduler.start_heartbeat(channel, now_ms) {
            warn!("Service: {} pressed with a heartbeat already running", channel);
        }
        info!("Service: {} held", channel);

        // Fires tick 0, which carries the press opcode.
        self.poll(now_ms);
        self.notify_changes();
        Ok(Outcome::Applied)
    }

    /// A hold control came up at `now_ms`.
    pub fn release(&mut self, source: &str, now_ms: u64) -> Result<Outcome> {
        let channel = self.resolve(source)?;
        self.poll(now_ms);

        let has_heartbeat = self.scheduler.has_heartbeat(channel);
        let Some(actuator) = self.registry.get_mut(channel) else {
            return Err(Error::UnknownSource(source.to_string()));
        };
        if actuator.state() == ActuatorState::Held && !has_heartbeat {
            return Ok(ignored(channel, "release", Misuse::NotHeld));
        }
        if let Err(misuse) = actuator.release() {
            return Ok(ignored(channel, "release", misuse));
        }

        self.scheduler.cancel_heartbeat(channel);
        self.gate.send(Command::new(channel, Opcode::Open));
        self.scheduler
            .arm_grace(channel, now_ms, self.config.grace_period_ms);
        info!("Service: {} released, grace {}ms", channel, self.config.grace_period_ms);

        self.notify_changes();
        Ok(Outcome::Applied)
    }

    /// A toggle control was clicked at `now_ms`.
    pub fn click(&mut self, source: &str, now_ms: u64) -> Result<Outcome> {
        let channel = self.resolve(source)?;
        self.poll(now_ms);

        let Some(actuator) = self.registry.get_mut(channel) else {
            return Err(Error::UnknownSource(source.to_string()));
        };
        let opcode = match actuator.click() {
            Ok(opcode) => opcode,
            Err(misuse) => return Ok(ignored(channel, "click", misuse)),
        };
        if opcode == Opcode::Close {
            if !self.registry.lock_group(channel) {
                if let Some(actuator) = self.registry.get_mut(channel) {
                    actuator.force_idle();
                }
                return Ok(ignored(channel, "click", Misuse::GroupLocked));
            }
        } else {
            self.registry.unlock_group(channel);
        }
        self.gate.send(Command::new(channel, opcode));
        info!(
            "Service: {} toggled {}",
            channel,
            if opcode == Opcode::Close { "closed" } else { "open" }
        );

        self.notify_changes();
        Ok(Outcome::Applied)
    }

    /// Deactivate one channel immediately from any state.
    ///
    /// Sends `3` even when the channel is already idle.
    pub fn force_deactivate(&mut self, source: &str) -> Result<Outcome> {
        let channel = self.resolve(source)?;
        self.force_deactivate_channel(channel);
        self.notify_changes();
        Ok(Outcome::Applied)
    }

    // ── Global operations ─────────────────────────────────────

    /// Enable or disable every control at once.
    pub fn set_enabled_all(&mut self, enabled: bool) {
        self.registry.set_enabled_all(enabled);
        self.notify_changes();
    }

    /// Deactivate every channel and release every group.
    pub fn deactivate_all(&mut self) {
        let channels = self.registry.deactivate_all();
        for channel in channels {
            self.scheduler.cancel_heartbeat(channel);
            self.scheduler.cancel_grace(channel);
            self.gate.send(Command::new(channel, Opcode::Open));
        }
        info!("Service: all channels deactivated");
        self.notify_changes();
    }

    // ── Timers ────────────────────────────────────────────────

    /// Run every timer due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) {
        let mut queue = FiredQueue::default();
        self.scheduler.poll(now_ms, &mut queue);
        if queue.0.is_empty() {
            return;
        }
        for (channel, fired) in queue.0 {
            match fired {
                TimerFired::Heartbeat { tick } => self.on_heartbeat(channel, tick),
                TimerFired::GraceElapsed => self.on_grace_elapsed(channel),
            }
        }
        self.notify_changes();
    }

    /// Earliest time [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    fn on_heartbeat(&mut self, channel: Channel, tick: u32) {
        let held = self
            .registry
            .get(channel)
            .is_some_and(|a| a.state() == ActuatorState::Held);
        if !held {
            warn!("Service: heartbeat on {} while not held, cancelling", channel);
            self.scheduler.cancel_heartbeat(channel);
            return;
        }
        let opcode = if tick == 0 {
            self.config.press_opcode
        } else {
            Opcode::Heartbeat
        };
        self.gate.send(Command::new(channel, opcode));
    }

    fn on_grace_elapsed(&mut self, channel: Channel) {
        let Some(actuator) = self.registry.get_mut(channel) else {
            return;
        };
        if actuator.grace_elapsed() {
            self.registry.unlock_group(channel);
            info!("Service: {} idle", channel);
        }
    }

    // ── Link ──────────────────────────────────────────────────

    /// React to a link state change reported by the link's owner.
    ///
    /// Leaving `Connected` force-deactivates everything, so a reconnect
    /// never resumes a heartbeat. Controls stay interactable; with no link
    /// their commands go nowhere.
    pub fn on_link_state_changed(&mut self, state: ConnectionState) {
        if state == self.link_state {
            return;
        }
        info!("Service: link {:?} -> {:?}", self.link_state, state);
        let was_connected = self.link_state.is_connected();
        self.link_state = state;
        if was_connected && !state.is_connected() {
            self.deactivate_all();
        }
        self.ui.on_connection_changed(state);
    }

    /// Read the link state and react if it moved.
    pub fn sync_link_state(&mut self) {
        let state = self.gate.state();
        self.on_link_state_changed(state);
    }

    pub fn connect(&mut self, target: &str) -> Result<()> {
        self.gate.connect(target)?;
        self.sync_link_state();
        Ok(())
    }

    /// Deactivate everything while the link is still up, then close it.
    pub fn disconnect(&mut self) {
        self.deactivate_all();
        self.gate.disconnect();
        self.sync_link_state();
    }

    /// Leave the board in a safe state. Timers are gone afterwards.
    pub fn shutdown(&mut self) {
        self.deactivate_all();
        self.scheduler.cancel_all();
        info!("RelayService: shut down");
    }

    // ── Command dispatch ──────────────────────────────────────

    /// Apply a queued [`ControlCommand`] at `now_ms`.
    pub fn handle_command(&mut self, cmd: ControlCommand, now_ms: u64) -> Result<Outcome> {
        match cmd {
            ControlCommand::Press { source } => self.press(&source, now_ms),
            ControlCommand::Release { source } => self.release(&source, now_ms),
            ControlCommand::Click { source } => self.click(&source, now_ms),
            ControlCommand::ForceDeactivate { source } => self.force_deactivate(&source),
            ControlCommand::SetEnabledAll(enabled) => {
                self.set_enabled_all(enabled);
                Ok(Outcome::Applied)
            }
            ControlCommand::DeactivateAll => {
                self.deactivate_all();
                Ok(Outcome::Applied)
            }
            ControlCommand::LinkStateChanged(state) => {
                self.on_link_state_changed(state);
                Ok(Outcome::Applied)
            }
            ControlCommand::Connect(target) => {
                self.connect(&target)?;
                Ok(Outcome::Applied)
            }
            ControlCommand::Disconnect => {
                self.disconnect();
                Ok(Outcome::Applied)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            link: self.link_state,
            enabled_all: self.registry.is_enabled_all(),
            gate: self.gate.stats(),
            active_timers: self.scheduler.active_count(),
            channels: self
                .registry
                .iter()
                .map(|a| ChannelSnapshot {
                    channel: a.channel(),
                    source: a.source().to_string(),
                    behavior: a.behavior(),
                    state: a.state(),
                    enabled: a.is_enabled(),
                    active: a.is_active(),
                    locked_by: a.locked_by(),
                    heartbeat: self.scheduler.has_heartbeat(a.channel()),
                })
                .collect(),
        }
    }

    pub fn actuator(&self, source: &str) -> Result<&ChannelActuator> {
        let channel = self.resolve(source)?;
        self.registry
            .get(channel)
            .ok_or_else(|| Error::UnknownSource(source.to_string()))
    }

    pub fn registry(&self) -> &ActuatorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    pub fn link(&self) -> &L {
        self.gate.link()
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.gate.link_mut()
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    /// Tear down into the link and UI adapters.
    pub fn into_parts(self) -> (L, U) {
        (self.gate.into_link(), self.ui)
    }

    // ── Internal ──────────────────────────────────────────────

    fn resolve(&self, source: &str) -> Result<Channel> {
        self.registry
            .lookup(source)
            .map_err(|_| Error::UnknownSource(source.to_string()))
    }

    fn force_deactivate_channel(&mut self, channel: Channel) {
        self.scheduler.cancel_heartbeat(channel);
        self.scheduler.cancel_grace(channel);
        if let Some(actuator) = self.registry.get_mut(channel) {
            actuator.force_idle();
        }
        self.registry.unlock_group(channel);
        self.gate.send(Command::new(channel, Opcode::Open));
        info!("Service: {} force-deactivated", channel);
    }

    /// Push effective enablement and activation changes to the UI.
    fn notify_changes(&mut self) {
        for actuator in self.registry.iter_mut() {
            let channel = actuator.channel();
            if let Some(enabled) = actuator.take_enabled_change() {
                self.ui.on_enabled_changed(channel, enabled);
            }
            if let Some(active) = actuator.take_activation_change() {
                self.ui.on_activation_changed(channel, active);
            }
        }
    }
}
