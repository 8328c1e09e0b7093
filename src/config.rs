//! Engine configuration and board layout.
//!
//! Timing is tuned to the board's command latency, so none of it is
//! hardcoded in the engine. The layout maps UI controls onto relay
//! channels and is validated once, when the registry is built.

use serde::{Deserialize, Serialize};

use crate::actuator::ButtonBehavior;
use crate::error::ConfigError;
use crate::protocol::{Channel, Opcode};

/// Timing and protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval between keep-alive commands while a hold control is down (ms).
    pub heartbeat_period_ms: u64,
    /// Wait after an explicit deactivate before the channel (and its group)
    /// may be used again (ms). Must cover the worst-case in-flight command.
    pub grace_period_ms: u64,
    /// How long the board keeps a relay closed after one heartbeat (ms).
    pub board_blink_ms: u64,
    /// Opcode sent by the first heartbeat tick, at the moment of the press.
    pub press_opcode: Opcode,
    /// Upper bound on how long the controller sleeps between link checks (ms).
    pub link_poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_period_ms: 400,
            grace_period_ms: 1000,
            board_blink_ms: 1000,
            press_opcode: Opcode::Close,
            link_poll_interval_ms: 250,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("heartbeat_period_ms must be > 0"));
        }
        if self.heartbeat_period_ms >= self.board_blink_ms {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_period_ms must be shorter than board_blink_ms",
            ));
        }
        if self.grace_period_ms < self.board_blink_ms {
            return Err(ConfigError::ValidationFailed(
                "grace_period_ms must cover board_blink_ms",
            ));
        }
        if !self.press_opcode.is_activation() {
            return Err(ConfigError::ValidationFailed(
                "press_opcode must be an activating opcode",
            ));
        }
        if self.link_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("link_poll_interval_ms must be > 0"));
        }
        Ok(())
    }
}

/// One UI control bound to one relay channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBinding {
    /// Opaque id of the UI control delivering events.
    pub source: String,
    pub channel: Channel,
    pub behavior: ButtonBehavior,
    /// Mutual exclusion group name, if any.
    #[serde(default)]
    pub group: Option<String>,
}

/// The full set of controls for one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    #[serde(default)]
    pub engine: EngineConfig,
    pub controls: Vec<ControlBinding>,
}

impl BoardLayout {
    /// Parse a JSON layout document and validate its timing.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let layout: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        layout.engine.validate()?;
        Ok(layout)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
