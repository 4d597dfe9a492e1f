//! Configuration management.
//!
//! Settings load from an optional `config/<env>.toml` (selected by
//! `DEFISTATE_ENV`, defaulting to `default`) with `DEFISTATE_`-prefixed
//! environment variables layered on top. Every field carries a serde default
//! so an empty configuration is a valid one.

use std::collections::HashMap;
use std::env;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::route_engine::ActivePoolPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    /// Capacity of the bounded processed-snapshot channel. When consumers lag
    /// beyond it, snapshots are dropped with a warning.
    #[serde(default = "default_snapshot_channel_capacity")]
    pub snapshot_channel_capacity: usize,
}

fn default_snapshot_channel_capacity() -> usize {
    8
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            snapshot_channel_capacity: default_snapshot_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphSettings {
    /// Dangling edges tolerated before the registry compacts in place.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: usize,
}

fn default_compaction_threshold() -> usize {
    256
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            compaction_threshold: default_compaction_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingSettings {
    /// Relaxation iterations used when a caller does not pick a count.
    #[serde(default = "default_runs")]
    pub default_runs: usize,
    /// Active-pool policy per chain id, e.g. `{ "1" = "routable" }`.
    #[serde(default)]
    pub active_pool_policy: HashMap<String, ActivePoolPolicy>,
}

fn default_runs() -> usize {
    4
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            default_runs: default_runs(),
            active_pool_policy: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub routing: RoutingSettings,
}

impl Settings {
    /// Loads configuration from file and environment.
    pub fn new() -> Result<Self, ConfigError> {
        let run_env = env::var("DEFISTATE_ENV").unwrap_or_else(|_| "default".into());
        Config::builder()
            .add_source(File::with_name(&format!("config/{run_env}")).required(false))
            .add_source(config::Environment::with_prefix("DEFISTATE").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Policy for `chain_id`, falling back to the default policy.
    pub fn policy_for_chain(&self, chain_id: u64) -> ActivePoolPolicy {
        self.routing
            .active_pool_policy
            .get(&chain_id.to_string())
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let settings = Settings::default();
        assert!(settings.client.snapshot_channel_capacity > 0);
        assert!(settings.graph.compaction_threshold > 0);
        assert_eq!(settings.policy_for_chain(1), ActivePoolPolicy::Routable);
    }

    #[test]
    fn per_chain_policy_lookup() {
        let mut settings = Settings::default();
        settings
            .routing
            .active_pool_policy
            .insert("137".into(), ActivePoolPolicy::All);
        assert_eq!(settings.policy_for_chain(137), ActivePoolPolicy::All);
        assert_eq!(settings.policy_for_chain(1), ActivePoolPolicy::Routable);
    }
}
