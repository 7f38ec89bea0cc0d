//! Configuration module.
//!
//! Loads the daemon configuration from TOML with environment-variable
//! expansion and overrides, validates it, and resolves per-check
//! configurations by merging global defaults with optional overrides.
//!
//! ## Loading Order
//!
//! 1. Explicit path from the command line
//! 2. `$STATUS_CHECKER_CONFIG`
//! 3. `/etc/status-checker/config.toml`
//! 4. `./config.toml`
//! 5. Built-in defaults

mod checker_config;
pub mod defaults;
pub mod validation;

pub use checker_config::{
    expand_env, resolve_check, CheckConfig, CheckOverride, CheckerConfig, ConfigError,
    ConfigSource, LogConfig, ScheduleDefaults,
};
