//! Application core: pure engine logic, zero I/O.
//!
//! This module contains the activation rules: press/release/click
//! handling, heartbeat and grace timer dispatch, group locking and link
//! state reactions. All interaction with the board and the UI happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without a device.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
