//! Log-based UI adapter.
//!
//! Implements [`UiPort`] by writing every affordance change to the `log`
//! facade. Useful headless, and as the fallback when no widget toolkit is
//! attached.

use log::info;

use crate::app::ports::{ConnectionState, UiPort};
use crate::protocol::Channel;

/// Adapter that logs every UI notification.
#[derive(Debug, Default)]
pub struct LogUi;

impl LogUi {
    pub fn new() -> Self {
        Self
    }
}

impl UiPort for LogUi {
    fn on_enabled_changed(&mut self, channel: Channel, enabled: bool) {
        info!("UI | {} {}", channel, if enabled { "enabled" } else { "disabled" });
    }

    fn on_activation_changed(&mut self, channel: Channel, active: bool) {
        info!("UI | {} {}", channel, if active { "ON" } else { "off" });
    }

    fn on_connection_changed(&mut self, state: ConnectionState) {
        info!("UI | link {:?}", state);
    }
}
