//! relayctl: dead-man-switch activation engine for serial relay boards.
//!
//! A held control keeps its relay alive by re-sending a short activation
//! command every heartbeat period. If the link drops, the board's own
//! pulse timeout opens the relay within about a second. Mutually exclusive
//! channels (up/down, left/right) are never energised together, and a
//! released channel waits out a grace period before it or its siblings can
//! be used again.
//!
//! The engine is pure and single-writer ([`app::service::RelayService`]);
//! [`runtime::Controller`] runs it on its own thread; [`adapters`] connect
//! it to a serial device, the log and the system clock.

#![deny(unused_must_use)]

pub mod actuator;
pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod gate;
pub mod group;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod scheduler;

pub use app::commands::ControlCommand;
pub use app::ports::{Clock, ConnectionState, LinkPort, UiPort};
pub use app::service::{Misuse, Outcome, RelayService};
pub use config::{BoardLayout, ControlBinding, EngineConfig};
pub use error::{ConfigError, Error, LinkError, Result};
pub use protocol::{Channel, Command, Opcode};
pub use registry::{ActuatorRegistry, RegistryBuilder};
pub use runtime::Controller;
