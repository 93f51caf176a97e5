//! Controller configuration parameters
//!
//! Timing knobs for the session lifecycle and servo motion.  Loaded from a
//! JSON file by the runner binary; every field falls back to its default
//! when absent.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Session ---
    /// How long `open` waits for the link before giving up (ms)
    pub open_timeout_ms: u64,
    /// Interval between liveness probes while open (ms)
    pub liveness_interval_ms: u64,
    /// Consecutive unanswered probes before the session is dropped
    pub max_missed_probes: u8,

    // --- Servo ---
    /// Settling wait per degree of travel for instantaneous moves (ms)
    pub servo_settle_factor_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: 5_000,
            liveness_interval_ms: 1_000,
            max_missed_probes: 3,
            servo_settle_factor_ms: 3,
        }
    }
}

impl ControllerConfig {
    /// Reject values that would stall the session timers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("open_timeout_ms must be > 0"));
        }
        if self.liveness_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "liveness_interval_ms must be > 0",
            ));
        }
        if self.max_missed_probes == 0 {
            return Err(ConfigError::ValidationFailed("max_missed_probes must be > 0"));
        }
        Ok(())
    }
}
