//! Editor configuration.
//!
//! Hosts pass a JSON object; every field is optional and falls back to the
//! defaults below.

use pd_core::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-session editor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo steps kept before the oldest is dropped. Default: **100**.
    pub history_depth: usize,

    /// Cap on ancestor walks and hierarchy depth. Default: **20**.
    pub max_tree_depth: usize,

    pub autosave: AutoSaveConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            max_tree_depth: DEFAULT_MAX_DEPTH,
            autosave: AutoSaveConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Parse host configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Never zero; a zero depth would silently disable undo.
    pub fn history_depth(&self) -> usize {
        self.history_depth.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// When false, the coordinator never saves on its own; explicit
    /// `save()` calls still work. Default: **true**.
    pub enabled: bool,

    /// Quiet period after the last change before saving. Default: **1000 ms**.
    pub debounce_ms: u64,

    /// Safety-net save cadence while changes are pending. Default: **30 000 ms**.
    pub interval_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 1000,
            interval_ms: 30_000,
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Never zero; tokio's interval panics on a zero period.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}
