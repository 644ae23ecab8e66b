//! Application settings, loaded from `.cache/config.json` when present.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::StorageManager;

// Default-value helpers (required by serde `default = "..."`). Every field
// carries a default so an older config file keeps loading after new fields
// are added.

fn default_history_days() -> u32 {
    90
}

fn default_live_interval_secs() -> u64 {
    60
}

fn default_live_duration_secs() -> u64 {
    3600
}

fn default_top_limit() -> usize {
    10
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// Day window for one-shot historical analysis.
    #[serde(default = "default_history_days")]
    pub history_days: u32,

    /// Refresh cadence of the live view, in seconds.
    #[serde(default = "default_live_interval_secs")]
    pub live_interval_secs: u64,

    /// Total live-view session length, in seconds.
    #[serde(default = "default_live_duration_secs")]
    pub live_duration_secs: u64,

    /// Row count for the top-coins snapshot.
    #[serde(default = "default_top_limit")]
    pub top_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            live_interval_secs: default_live_interval_secs(),
            live_duration_secs: default_live_duration_secs(),
            top_limit: default_top_limit(),
        }
    }
}

impl AppConfig {
    /// Load `config.json` from storage, falling back to defaults when the
    /// file is absent or unreadable.
    pub async fn load(storage: &StorageManager) -> Self {
        match storage.load("config").await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "no usable config file, using defaults");
                Self::default()
            }
        }
    }
}
