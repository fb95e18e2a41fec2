//! Timing settings for the rule store and the XHR replay.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelaySettings {
    /// Upper bound for one rule-fetch round trip
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_relay_timeout_ms() -> u64 {
    1000
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_relay_timeout_ms(),
        }
    }
}

impl RelaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshSettings {
    /// Fallback polling interval; push updates do not wait for it
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Window after startup during which an empty rule set means "still loading"
    #[serde(default = "default_init_grace_ms")]
    pub init_grace_ms: u64,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_init_grace_ms() -> u64 {
    100
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            init_grace_ms: default_init_grace_ms(),
        }
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn init_grace(&self) -> Duration {
        Duration::from_millis(self.init_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XhrSettings {
    /// Pause between two ready-state transitions of a replayed request
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,
}

fn default_stage_delay_ms() -> u64 {
    10
}

impl Default for XhrSettings {
    fn default() -> Self {
        Self {
            stage_delay_ms: default_stage_delay_ms(),
        }
    }
}

impl XhrSettings {
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }
}
