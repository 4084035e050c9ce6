//! Simulator configuration surface (ambient stack, ties into component G).
//!
//! This is the one piece of configuration the core itself owns. It does not
//! parse CLI args or files — that stays the embedding binary's job — but it
//! is a plain `serde`-friendly value type so a binary can load it from
//! TOML/JSON without this crate reaching for `std::env` or a CLI parser.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// When to release the second ("delayed") ACK of a switch command.
///
/// Only one policy is implemented today; the enum exists so a future
/// policy can be added without breaking the config's wire shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchAckDelay {
    /// Release the delayed ACK the next time RXB0 is empty after the
    /// current byte has been handled.
    NextRxDrainOpportunity,
}

impl Default for SwitchAckDelay {
    fn default() -> Self {
        SwitchAckDelay::NextRxDrainOpportunity
    }
}

fn default_sensor_poll_interval() -> Duration {
    Duration::from_millis(100)
}

/// Tunable cadences for a running [`crate::simulator::Simulator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_sensor_poll_interval")]
    pub sensor_poll_interval: Duration,
    #[serde(default)]
    pub switch_ack_delay: SwitchAckDelay,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            sensor_poll_interval: default_sensor_poll_interval(),
            switch_ack_delay: SwitchAckDelay::default(),
        }
    }
}
