//! Built-in configuration defaults.
//!
//! Every tunable has a named constant here so the daemon runs with zero
//! configuration files present.

/// Checks without an explicit override are scheduled.
pub const ENABLED_BY_DEFAULT: bool = true;

/// Default scheduling interval in seconds.
pub const INTERVAL_SECS: u64 = 30;

/// Default directory scanned for check scripts.
pub const CHECKS_DIR: &str = "./checks";

/// Default port for the Prometheus metrics endpoint.
pub const PROM_PORT: u16 = 9090;

/// Default tracing filter directive.
pub const LOG_LEVEL: &str = "info";

/// Environment variable naming the config file, checked after the CLI arg.
pub const CONFIG_ENV_VAR: &str = "STATUS_CHECKER_CONFIG";

/// Prefix for environment variables that override top-level config keys.
pub const ENV_PREFIX: &str = "STATUS_CHECKER_";

/// System-wide config location, checked before the working directory.
pub const ETC_CONFIG_PATH: &str = "/etc/status-checker/config.toml";

/// Config file name looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "config.toml";

/// How long the supervisor waits for tasks to drain after cancellation.
pub const SHUTDOWN_GRACE_SECS: u64 = 10;
