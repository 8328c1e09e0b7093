//! Heartbeat and grace timer engine.
//!
//! The scheduler notifies a [`SchedulerDelegate`] when timers fire; the
//! service implements the delegate and turns fires into relay commands.
//! It never reads a clock itself: every call carries `now_ms`, which keeps
//! it deterministic under test.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Timer Sources                           │
//! │                                                              │
//! │  ┌─────────────────────┐            ┌─────────────────────┐  │
//! │  │ Heartbeat (per held │            │ Grace one-shot (per │  │
//! │  │ channel, period P,  │            │ released channel)   │  │
//! │  │ first tick at t=0)  │            │                     │  │
//! │  └──────────┬──────────┘            └──────────┬──────────┘  │
//! │             │                                  │             │
//! │             ▼                                  ▼             │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                 SchedulerDelegate                      │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                 RelayService timer dispatch                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::app::ports::{SchedulerDelegate, TimerFired};
use crate::protocol::{Channel, MAX_CHANNELS};

// ═══════════════════════════════════════════════════════════════
//  Timer entries
// ═══════════════════════════════════════════════════════════════

/// Live heartbeat bookkeeping for one channel.
#[derive(Debug, Clone, Copy)]
struct Heartbeat {
    /// Absolute time of the next tick.
    next_due_ms: u64,
    /// Ticks fired so far.
    ticks: u32,
}

/// Upper bound on fires per poll: one heartbeat and one grace per channel.
const MAX_FIRES: usize = 2 * MAX_CHANNELS;

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Per-channel heartbeat and grace timers, indexed by [`Channel::index`].
pub struct HeartbeatScheduler {
    period_ms: u64,
    heartbeats: [Option<Heartbeat>; MAX_CHANNELS],
    /// Absolute deadline of each armed grace timer.
    graces: [Option<u64>; MAX_CHANNELS],
    /// Periods dropped because a poll arrived late.
    skipped_ticks: u64,
}

impl HeartbeatScheduler {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            heartbeats: [None; MAX_CHANNELS],
            graces: [None; MAX_CHANNELS],
            skipped_ticks: 0,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    // ── Heartbeats ────────────────────────────────────────────

    /// Start a heartbeat whose first tick is due at `now_ms`.
    ///
    /// Returns `false` (and changes nothing) if the channel already has one.
    pub fn start_heartbeat(&mut self, channel: Channel, now_ms: u64) -> bool {
        let slot = &mut self.heartbeats[channel.index()];
        if slot.is_some() {
            warn!("Scheduler: heartbeat for {} already running", channel);
            return false;
        }
        *slot = Some(Heartbeat {
            next_due_ms: now_ms,
            ticks: 0,
        });
        debug!("Scheduler: heartbeat {} started at {}ms", channel, now_ms);
        true
    }

    /// Stop the channel's heartbeat. Idempotent; returns whether one was running.
    pub fn cancel_heartbeat(&mut self, channel: Channel) -> bool {
        let was = self.heartbeats[channel.index()].take().is_some();
        if was {
            debug!("Scheduler: heartbeat {} cancelled", channel);
        }
        was
    }

    pub fn has_heartbeat(&self, channel: Channel) -> bool {
        self.heartbeats[channel.index()].is_some()
    }

    // ── Grace timers ──────────────────────────────────────────

    /// Arm the channel's grace timer to fire at `now_ms + delay_ms`,
    /// replacing any previous one.
    pub fn arm_grace(&mut self, channel: Channel, now_ms: u64, delay_ms: u64) {
        let due = now_ms.saturating_add(delay_ms);
        if self.graces[channel.index()].replace(due).is_some() {
            warn!("Scheduler: grace for {} re-armed", channel);
        }
        debug!("Scheduler: grace {} due at {}ms", channel, due);
    }

    /// Disarm the channel's grace timer. Idempotent.
    pub fn cancel_grace(&mut self, channel: Channel) -> bool {
        self.graces[channel.index()].take().is_some()
    }

    pub fn has_grace(&self, channel: Channel) -> bool {
        self.graces[channel.index()].is_some()
    }

    /// Drop every timer.
    pub fn cancel_all(&mut self) {
        self.heartbeats = [None; MAX_CHANNELS];
        self.graces = [None; MAX_CHANNELS];
    }

    // ── Polling ───────────────────────────────────────────────

    /// Earliest pending deadline, if any timer is armed.
    pub fn next_deadline(&self) -> Option<u64> {
        let hb = self.heartbeats.iter().flatten().map(|h| h.next_due_ms);
        let grace = self.graces.iter().flatten().copied();
        hb.chain(grace).min()
    }

    /// Number of armed timers of either kind.
    pub fn active_count(&self) -> usize {
        self.heartbeats.iter().flatten().count() + self.graces.iter().flatten().count()
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    /// Fire every timer due at `now_ms`, in deadline order.
    ///
    /// A heartbeat fires at most once per poll. If the poll is late by more
    /// than a period the missed ticks are dropped and the next tick stays on
    /// the tick phase. Grace timers are one-shot and disarm on fire.
    pub fn poll(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        let mut due: heapless::Vec<(u64, Channel, TimerFired), MAX_FIRES> = heapless::Vec::new();

        for (i, slot) in self.heartbeats.iter_mut().enumerate() {
            let Some(hb) = slot else { continue };
            if hb.next_due_ms > now_ms {
                continue;
            }
            let fired_at = hb.next_due_ms;
            let tick = hb.ticks;
            let missed = (now_ms - hb.next_due_ms) / self.period_ms;
            if missed > 0 {
                self.skipped_ticks += missed;
                debug!("Scheduler: skipped {} heartbeat period(s)", missed);
            }
            hb.ticks = hb.ticks.saturating_add(1);
            hb.next_due_ms += (missed + 1) * self.period_ms;
            if let Some(channel) = channel_at(i) {
                let _ = due.push((fired_at, channel, TimerFired::Heartbeat { tick }));
            }
        }

        for (i, slot) in self.graces.iter_mut().enumerate() {
            match *slot {
                Some(deadline) if deadline <= now_ms => {
                    *slot = None;
                    if let Some(channel) = channel_at(i) {
                        info!("Scheduler: grace {} elapsed", channel);
                        let _ = due.push((deadline, channel, TimerFired::GraceElapsed));
                    }
                }
                _ => {}
            }
        }

        due.sort_unstable_by_key(|(at, channel, _)| (*at, *channel));
        for (_, channel, fired) in due {
            delegate.on_timer_fired(channel, fired);
        }
    }
}

fn channel_at(index: usize) -> Option<Channel> {
    crate::protocol::SUPPORTED_CHANNELS
        .get(index)
        .and_then(|label| Channel::new(*label).ok())
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
