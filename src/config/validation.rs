//! Startup validation of the loaded configuration.
//!
//! Violations are collected into a single [`ConfigError::Validation`] so
//! the operator sees every problem in one pass instead of fixing them one
//! restart at a time.

use tracing_subscriber::EnvFilter;

use super::checker_config::{CheckerConfig, ConfigError};

/// Validate ranges and formats. Returns all violations at once.
pub fn validate(config: &CheckerConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.interval_secs == 0 {
        errors.push("interval_secs must be at least 1".to_string());
    }

    if config.prom_port == 0 {
        errors.push("prom_port must be non-zero".to_string());
    }

    if config.checks_dir.trim().is_empty() {
        errors.push("checks_dir must not be empty".to_string());
    }

    for (name, override_) in &config.checks {
        if override_.interval_secs == Some(0) {
            errors.push(format!(
                "checks.\"{}\".interval_secs must be at least 1",
                name
            ));
        }
    }

    if EnvFilter::try_new(&config.logs.level).is_err() {
        errors.push(format!(
            "logs.level {:?} is not a valid filter directive",
            config.logs.level
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckOverride;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&CheckerConfig::default()).is_ok());
    }

    #[test]
    fn zero_interval_rejected() {
        let config = CheckerConfig {
            interval_secs: 0,
            ..CheckerConfig::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn zero_override_interval_rejected() {
        let mut config = CheckerConfig::default();
        config.checks.insert(
            "a.sh".to_string(),
            CheckOverride {
                enabled: None,
                interval_secs: Some(0),
            },
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("a.sh"));
    }

    #[test]
    fn all_violations_reported_together() {
        let config = CheckerConfig {
            interval_secs: 0,
            prom_port: 0,
            checks_dir: "  ".to_string(),
            ..CheckerConfig::default()
        };
        match validate(&config) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected Validation error, got {:?}", other),
        }
    }
}
