//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements | Connects to                         |
//! |---------------|------------|-------------------------------------|
//! | `log_ui`      | UiPort     | `log` facade                        |
//! | `serial_link` | LinkPort   | Serial tty (USB-UART, RFCOMM)       |
//! | `time`        | Clock      | `std::time::Instant`                |

pub mod log_ui;
#[cfg(feature = "serial")]
pub mod serial_link;
pub mod time;
