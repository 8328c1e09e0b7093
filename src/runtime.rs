//! Controller runtime: the single-writer event loop.
//!
//! ```text
//! ┌─────────────┐  ControlCommand   ┌────────────────────────────┐
//! │ UI threads  │ ────────────────▶ │ controller thread          │
//! │ (Controller │   (crossbeam)     │  recv_timeout(next timer)  │
//! │  handles)   │                   │  poll · sync link · apply  │
//! └─────────────┘                   └─────────────┬──────────────┘
//!                                                 ▼
//!                                           RelayService
//! ```
//!
//! Handles never block on the engine: every method enqueues and returns.
//! The thread sleeps until the earlier of the next scheduler deadline and
//! the link poll interval, so a dropped link is noticed even while idle.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::app::commands::ControlCommand;
use crate::app::ports::{Clock, ConnectionState, LinkPort, UiPort};
use crate::app::service::{Outcome, RelayService};
use crate::error::{Error, Result};

enum Message {
    Command(ControlCommand),
    Shutdown,
}

/// Handle to a running controller thread.
///
/// Dropping the handle shuts the thread down the same way
/// [`shutdown`](Self::shutdown) does, discarding the service.
pub struct Controller<L, U>
where
    L: LinkPort + Send + 'static,
    U: UiPort + Send + 'static,
{
    tx: Sender<Message>,
    thread: Option<JoinHandle<RelayService<L, U>>>,
}

impl<L, U> Controller<L, U>
where
    L: LinkPort + Send + 'static,
    U: UiPort + Send + 'static,
{
    /// Move `service` onto a new thread driven by `clock`.
    pub fn spawn<C>(service: RelayService<L, U>, clock: C) -> std::io::Result<Self>
    where
        C: Clock + Send + 'static,
    {
        let (tx, rx) = channel::unbounded();
        let thread = thread::Builder::new()
            .name("relay-controller".into())
            .spawn(move || run(service, &clock, &rx))?;
        info!("Controller: started");
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    pub fn press(&self, source: &str) -> Result<()> {
        self.send(ControlCommand::press(source))
    }

    pub fn release(&self, source: &str) -> Result<()> {
        self.send(ControlCommand::release(source))
    }

    pub fn click(&self, source: &str) -> Result<()> {
        self.send(ControlCommand::click(source))
    }

    pub fn force_deactivate(&self, source: &str) -> Result<()> {
        self.send(ControlCommand::ForceDeactivate {
            source: source.to_string(),
        })
    }

    pub fn set_enabled_all(&self, enabled: bool) -> Result<()> {
        self.send(ControlCommand::SetEnabledAll(enabled))
    }

    pub fn deactivate_all(&self) -> Result<()> {
        self.send(ControlCommand::DeactivateAll)
    }

    pub fn link_state_changed(&self, state: ConnectionState) -> Result<()> {
        self.send(ControlCommand::LinkStateChanged(state))
    }

    pub fn connect(&self, target: &str) -> Result<()> {
        self.send(ControlCommand::Connect(target.to_string()))
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(ControlCommand::Disconnect)
    }

    /// Enqueue any command.
    pub fn send(&self, cmd: ControlCommand) -> Result<()> {
        self.tx.send(Message::Command(cmd)).map_err(|_| Error::Stopped)
    }

    /// Stop the thread after deactivating every channel, and hand back
    /// the service for inspection.
    pub fn shutdown(mut self) -> Result<RelayService<L, U>> {
        let thread = self.thread.take().ok_or(Error::Stopped)?;
        let _ = self.tx.send(Message::Shutdown);
        thread.join().map_err(|_| Error::Stopped)
    }
}

impl<L, U> Drop for Controller<L, U>
where
    L: LinkPort + Send + 'static,
    U: UiPort + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Message::Shutdown);
            if thread.join().is_err() {
                warn!("Controller: thread panicked");
            }
        }
    }
}

fn run<L, U, C>(
    mut service: RelayService<L, U>,
    clock: &C,
    rx: &Receiver<Message>,
) -> RelayService<L, U>
where
    L: LinkPort,
    U: UiPort,
    C: Clock,
{
    let link_poll_ms = service.config().link_poll_interval_ms;

    loop {
        let now = clock.now_ms();
        service.poll(now);
        service.sync_link_state();

        let wait_ms = service
            .next_deadline()
            .map_or(link_poll_ms, |deadline| deadline.saturating_sub(now))
            .min(link_poll_ms);

        match rx.recv_timeout(Duration::from_millis(wait_ms)) {
            Ok(Message::Command(cmd)) => {
                let now = clock.now_ms();
                match service.handle_command(cmd, now) {
                    Ok(Outcome::Applied) => {}
                    Ok(Outcome::Ignored(misuse)) => debug!("Controller: ignored ({})", misuse),
                    Err(e) => warn!("Controller: {}", e),
                }
            }
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    service.shutdown();
    info!("Controller: stopped after {}s", clock.uptime_secs());
    service
}
