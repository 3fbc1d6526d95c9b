use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::store::NamespacedName;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherConfig {
    pub version: String,
    /// SQLite database file; falls back to `~/.driftwatch/data/driftwatch.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub default_poll_interval_secs: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub pairs: Vec<PairConfig>,
}

fn default_poll_interval() -> u64 {
    180
}

fn default_namespace() -> String {
    "default".to_string()
}

impl WatcherConfig {
    /// Poll interval for a pair, falling back to the configured default.
    pub fn interval_for(&self, pair: &PairConfig) -> u64 {
        pair.poll_interval_secs
            .unwrap_or(self.default_poll_interval_secs)
    }

    pub fn find_pair(&self, name: &str, namespace: &str) -> Option<&PairConfig> {
        self.pairs
            .iter()
            .find(|p| p.name == name && p.namespace == namespace)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairConfig {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub origin: String,
    pub target: String,
    /// Branch compared on both sides; empty follows `HEAD`.
    #[serde(default)]
    pub target_revision: String,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl PairConfig {
    pub fn key(&self) -> NamespacedName {
        NamespacedName::new(&self.name, &self.namespace)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}
