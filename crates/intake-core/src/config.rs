//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::notify::NotifyRule;

/// External store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".into(),
            timeout_secs: 10,
        }
    }
}

/// Top-level configuration. Every field has a default so a partial config
/// file deserializes cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Provider-name fragments excluded from auto-assignment
    pub excluded_providers: Vec<String>,
    /// Intake notification triggers
    pub notify_rules: Vec<NotifyRule>,
    pub external: ExternalConfig,
}
