use crate::error::WaypathError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::Path,
    time::Duration,
};

/// Tunable behavior for the resolution engine.
///
/// Loaded from a TOML file when one exists, otherwise every field takes its
/// default. Unknown keys are rejected so typos fail loudly instead of
/// silently configuring nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaypathConfig {
    /// Layout discriminator value preferred when a path resolves to several
    /// entities. `None` disables tie-breaking entirely.
    pub preferred_layout: Option<String>,
    /// Allow-list of collections searched by the last-resort slug fallback,
    /// in priority order.
    pub fallback_collections: Vec<String>,
    /// Upper bound on ancestor walks. Exists to survive an accidental
    /// parent cycle, not as a modeling limit.
    pub max_ancestor_depth: u32,
    /// Iteration budget for subtree expansion.
    pub max_subtree_nodes: u32,
    /// How long a caller waits on an in-flight registry build before
    /// proceeding with whatever state exists, in milliseconds.
    pub build_wait_ms: u64,
}

impl Default for WaypathConfig {
    fn default() -> WaypathConfig {
        WaypathConfig {
            preferred_layout: Some("static".to_string()),
            fallback_collections: Vec::new(),
            max_ancestor_depth: 10,
            max_subtree_nodes: 10_000,
            build_wait_ms: 10_000,
        }
    }
}

impl WaypathConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<WaypathConfig, WaypathError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(WaypathConfig::default());
        }
        let content = read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WaypathError> {
        tracing::debug!("Attempting to write config to: {:?}", path.as_ref());
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }

    pub fn build_wait(&self) -> Duration {
        Duration::from_millis(self.build_wait_ms)
    }
}
