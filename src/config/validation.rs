//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, intervals and the key prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: &ReloaderConfig → Result<(), Vec<ConfigValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ReloaderConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("{field}: `{value}` is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("source.key_prefix `{0}` must be empty or end with '.'")]
    InvalidKeyPrefix(String),

    #[error("observability.log_level `{0}` is not a known level")]
    UnknownLogLevel(String),

    #[error("admin.api_key must not be empty when set")]
    EmptyApiKey,
}

pub fn validate_config(config: &ReloaderConfig) -> Result<(), Vec<ConfigValidationError>> {
    let mut errors = Vec::new();

    let prefix = &config.source.key_prefix;
    if !prefix.is_empty() && !prefix.ends_with('.') {
        errors.push(ConfigValidationError::InvalidKeyPrefix(prefix.clone()));
    }
    if config.source.poll_interval_secs == 0 {
        errors.push(ConfigValidationError::ZeroDuration {
            field: "source.poll_interval_secs",
        });
    }
    if config.reload.compile_budget_ms == 0 {
        errors.push(ConfigValidationError::ZeroDuration {
            field: "reload.compile_budget_ms",
        });
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if matches!(config.admin.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            errors.push(ConfigValidationError::EmptyApiKey);
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ConfigValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ConfigValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ReloaderConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ReloaderConfig::default();
        config.source.key_prefix = "gateway".into();
        config.reload.compile_budget_ms = 0;
        config.admin.bind_address = "nowhere".into();
        config.admin.api_key = Some("  ".into());
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ConfigValidationError::InvalidKeyPrefix("gateway".into())));
        assert!(errors.contains(&ConfigValidationError::EmptyApiKey));
    }

    #[test]
    fn test_disabled_admin_skips_address_check() {
        let mut config = ReloaderConfig::default();
        config.admin.enabled = false;
        config.admin.bind_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }
}
