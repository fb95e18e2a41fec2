//! Configuration types for Mockline.

mod rules;
mod settings;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use rules::{MatchType, MockRule, METHOD_WILDCARD};
pub use settings::{RefreshSettings, RelaySettings, XhrSettings};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub xhr: XhrSettings,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.relay.timeout_ms == 0 {
            anyhow::bail!(
                "relay.timeout_ms must be greater than 0, otherwise every rule fetch times out"
            );
        }

        if self.refresh.interval_secs == 0 {
            anyhow::bail!("refresh.interval_secs must be greater than 0");
        }

        Ok(())
    }
}
