//! Configuration schema definitions.
//!
//! All sections carry defaults, so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the route reloader process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReloaderConfig {
    /// Where route definitions come from.
    pub source: SourceConfig,

    /// Reload pipeline tunables.
    pub reload: ReloadConfig,

    pub admin: AdminConfig,

    pub observability: ObservabilityConfig,
}

/// File-backed route source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// TOML file holding `default-filters` and `[[routes]]`. Unset means
    /// routes only arrive through the admin API.
    pub route_file: Option<PathBuf>,

    /// Property prefix shared by every route key (e.g. `gateway.`).
    pub key_prefix: String,

    /// Poll interval for the file watcher in seconds.
    pub poll_interval_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            route_file: None,
            key_prefix: "gateway.".to_string(),
            poll_interval_secs: 2,
        }
    }
}

impl SourceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Upper bound on one route table compilation, in milliseconds.
    pub compile_budget_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            compile_budget_ms: 2_000,
        }
    }
}

impl ReloadConfig {
    pub fn compile_budget(&self) -> Duration {
        Duration::from_millis(self.compile_budget_ms)
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Bearer token. Unset disables authentication.
    pub api_key: Option<String>,

    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
