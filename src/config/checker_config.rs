//! Daemon configuration - all scheduling and exposition tunables as
//! operator-editable TOML values.
//!
//! Every field carries a built-in default from [`super::defaults`], so the
//! daemon starts with no config file at all. String values may reference
//! environment variables (`$VAR` or `${VAR}`), and any top-level scalar key
//! can be overridden with a `STATUS_CHECKER_*` environment variable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a status-checker deployment.
///
/// Load with [`CheckerConfig::load`], which searches:
/// 1. explicit path from the command line
/// 2. `$STATUS_CHECKER_CONFIG`
/// 3. `/etc/status-checker/config.toml`
/// 4. `./config.toml`
/// 5. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Whether checks without an explicit override are scheduled.
    pub enabled_by_default: bool,

    /// Default interval between runs of each check, in seconds.
    pub interval_secs: u64,

    /// Directory scanned for check scripts.
    pub checks_dir: String,

    /// OR the execute bits into every discovered file's mode.
    pub modify_permissions: bool,

    /// Port the Prometheus metrics endpoint listens on.
    pub prom_port: u16,

    /// Invoke the assertion sink after every check cycle.
    pub assertions: bool,

    /// Log output configuration.
    pub logs: LogConfig,

    /// Per-check overrides keyed by the check's root-relative path.
    pub checks: HashMap<String, CheckOverride>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: defaults::ENABLED_BY_DEFAULT,
            interval_secs: defaults::INTERVAL_SECS,
            checks_dir: defaults::CHECKS_DIR.to_string(),
            modify_permissions: false,
            prom_port: defaults::PROM_PORT,
            assertions: false,
            logs: LogConfig::default(),
            checks: HashMap::new(),
        }
    }
}

/// Log output configuration (`[logs]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Human-readable output instead of JSON.
    pub pretty: bool,
    /// Tracing filter directive, e.g. `"debug"` or `"info,status_checker=trace"`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

// ============================================================================
// Per-Check Overrides & Resolution
// ============================================================================

/// Per-check configuration fragment (`[checks."disk/free.sh"]` in config.toml).
///
/// Both fields are independently optional: a present field replaces the
/// global default, an absent one inherits it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckOverride {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
}

/// Effective configuration for one check, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckConfig {
    pub enabled: bool,
    pub interval: Duration,
}

/// Global fallback values used when an override field is absent.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleDefaults {
    pub enabled_by_default: bool,
    pub interval: Duration,
}

/// Merge an optional override with the global defaults.
///
/// Total over any input combination - there is no error path.
pub fn resolve_check(
    override_: Option<&CheckOverride>,
    defaults: ScheduleDefaults,
) -> CheckConfig {
    match override_ {
        None => CheckConfig {
            enabled: defaults.enabled_by_default,
            interval: defaults.interval,
        },
        Some(o) => CheckConfig {
            enabled: o.enabled.unwrap_or(defaults.enabled_by_default),
            interval: o
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
        },
    }
}

impl CheckerConfig {
    /// Global defaults used by per-check resolution.
    pub fn schedule_defaults(&self) -> ScheduleDefaults {
        ScheduleDefaults {
            enabled_by_default: self.enabled_by_default,
            interval: Duration::from_secs(self.interval_secs),
        }
    }

    /// Resolve the effective config for one check by name.
    pub fn check_config(&self, name: &str) -> CheckConfig {
        resolve_check(self.checks.get(name), self.schedule_defaults())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Where the effective configuration came from, for the startup log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicit path from the command line.
    CommandLine(PathBuf),
    /// Path named by `$STATUS_CHECKER_CONFIG`.
    EnvVar(PathBuf),
    /// File found on the standard search path.
    SearchPath(PathBuf),
    /// No file found anywhere - built-in defaults.
    Defaults,
}

impl CheckerConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit CLI path is an operator statement of intent, so a missing
    /// or invalid file there is an error. Files found through the search
    /// path must parse, but their absence falls through to the next
    /// candidate and finally to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            let config = Self::finalize(Self::load_from_file(path)?)?;
            return Ok((config, ConfigSource::CommandLine(path.to_path_buf())));
        }

        if let Some(path) = std::env::var(defaults::CONFIG_ENV_VAR)
            .ok()
            .filter(|s| !s.is_empty())
        {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::finalize(Self::load_from_file(&p)?)?;
                return Ok((config, ConfigSource::EnvVar(p)));
            }
            warn!(path = %path, "{} points to a non-existent file, falling back", defaults::CONFIG_ENV_VAR);
        }

        for candidate in [defaults::ETC_CONFIG_PATH, defaults::LOCAL_CONFIG_PATH] {
            let p = Path::new(candidate);
            if p.exists() {
                let config = Self::finalize(Self::load_from_file(p)?)?;
                return Ok((config, ConfigSource::SearchPath(p.to_path_buf())));
            }
        }

        let config = Self::finalize(Self::default())?;
        Ok((config, ConfigSource::Defaults))
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Apply environment expansion and overrides, then validate.
    fn finalize(mut self) -> Result<Self, ConfigError> {
        self.expand_env_refs();
        self.apply_env_overrides();
        super::validation::validate(&self)?;
        Ok(self)
    }

    /// Expand `$VAR` / `${VAR}` references in string-valued fields.
    fn expand_env_refs(&mut self) {
        self.checks_dir = expand_env(&self.checks_dir);
        self.logs.level = expand_env(&self.logs.level);
    }

    /// Apply `STATUS_CHECKER_*` environment overrides to top-level keys.
    ///
    /// Unparseable values are logged and ignored rather than silently
    /// clobbering a valid file value.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_override("CHECKS_DIR") {
            self.checks_dir = v;
        }
        if let Some(v) = env_override("INTERVAL_SECS") {
            match v.parse() {
                Ok(n) => self.interval_secs = n,
                Err(_) => warn!(value = %v, "Ignoring unparseable STATUS_CHECKER_INTERVAL_SECS"),
            }
        }
        if let Some(v) = env_override("PROM_PORT") {
            match v.parse() {
                Ok(n) => self.prom_port = n,
                Err(_) => warn!(value = %v, "Ignoring unparseable STATUS_CHECKER_PROM_PORT"),
            }
        }
        if let Some(v) = env_override("ENABLED_BY_DEFAULT") {
            self.enabled_by_default = parse_bool(&v);
        }
        if let Some(v) = env_override("MODIFY_PERMISSIONS") {
            self.modify_permissions = parse_bool(&v);
        }
        if let Some(v) = env_override("ASSERTIONS") {
            self.assertions = parse_bool(&v);
        }
        if let Some(v) = env_override("LOG_LEVEL") {
            self.logs.level = v;
        }
    }
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", defaults::ENV_PREFIX, key))
        .ok()
        .filter(|s| !s.is_empty())
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Expand `$VAR` and `${VAR}` references from the process environment.
///
/// Unknown variables expand to the empty string; a `$` not followed by a
/// variable name is kept literally.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some(&(start, '{')) => {
                let rest = &input[start + 1..];
                match rest.find('}') {
                    Some(end) => {
                        let name = &rest[..end];
                        out.push_str(&std::env::var(name).unwrap_or_default());
                        // Consume "{name}".
                        for _ in 0..name.chars().count() + 2 {
                            chars.next();
                        }
                    }
                    None => {
                        // Unterminated brace, keep the rest literally.
                        out.push('$');
                        out.push_str(&input[start..]);
                        break;
                    }
                }
            }
            Some(&(start, c2)) if c2.is_ascii_alphabetic() || c2 == '_' => {
                let rest = &input[start..];
                let len = rest
                    .find(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
                    .unwrap_or(rest.len());
                let name = &rest[..len];
                out.push_str(&std::env::var(name).unwrap_or_default());
                for _ in 0..len {
                    chars.next();
                }
            }
            _ => out.push('$'),
        }
    }

    out
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule_defaults() -> ScheduleDefaults {
        ScheduleDefaults {
            enabled_by_default: true,
            interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn no_override_inherits_both_defaults() {
        let resolved = resolve_check(None, schedule_defaults());
        assert_eq!(
            resolved,
            CheckConfig {
                enabled: true,
                interval: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn partial_override_replaces_only_present_field() {
        let override_ = CheckOverride {
            enabled: None,
            interval_secs: Some(10),
        };
        let resolved = resolve_check(Some(&override_), schedule_defaults());
        assert!(resolved.enabled, "absent enabled must inherit the default");
        assert_eq!(resolved.interval, Duration::from_secs(10));
    }

    #[test]
    fn full_override_wins_on_both_fields() {
        let override_ = CheckOverride {
            enabled: Some(false),
            interval_secs: Some(5),
        };
        let resolved = resolve_check(Some(&override_), schedule_defaults());
        assert_eq!(
            resolved,
            CheckConfig {
                enabled: false,
                interval: Duration::from_secs(5),
            }
        );
    }

    #[test]
    fn empty_override_table_is_all_defaults() {
        let override_ = CheckOverride::default();
        let resolved = resolve_check(Some(&override_), schedule_defaults());
        assert_eq!(resolved, resolve_check(None, schedule_defaults()));
    }

    #[test]
    fn check_config_resolves_by_name() {
        let toml_str = r#"
            interval_secs = 60

            [checks."net/ping.sh"]
            interval_secs = 5
        "#;
        let config: CheckerConfig = toml::from_str(toml_str).unwrap();

        let overridden = config.check_config("net/ping.sh");
        assert_eq!(overridden.interval, Duration::from_secs(5));
        assert!(overridden.enabled);

        let plain = config.check_config("disk/free.sh");
        assert_eq!(plain.interval, Duration::from_secs(60));
        assert!(plain.enabled);
    }

    #[test]
    fn defaults_match_constants() {
        let config = CheckerConfig::default();
        assert!(config.enabled_by_default);
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.checks_dir, "./checks");
        assert_eq!(config.prom_port, 9090);
        assert!(!config.modify_permissions);
        assert!(!config.assertions);
        assert!(!config.logs.pretty);
        assert_eq!(config.logs.level, "info");
    }

    #[test]
    fn expand_env_substitutes_braced_and_bare_refs() {
        std::env::set_var("STATUS_CHECKER_TEST_DIR", "/srv/checks");
        assert_eq!(
            expand_env("${STATUS_CHECKER_TEST_DIR}/probes"),
            "/srv/checks/probes"
        );
        assert_eq!(
            expand_env("$STATUS_CHECKER_TEST_DIR/probes"),
            "/srv/checks/probes"
        );
        std::env::remove_var("STATUS_CHECKER_TEST_DIR");
    }

    #[test]
    fn expand_env_unknown_var_becomes_empty() {
        assert_eq!(expand_env("${STATUS_CHECKER_NO_SUCH_VAR}/x"), "/x");
    }

    #[test]
    fn expand_env_keeps_literal_dollar() {
        assert_eq!(expand_env("cost: 5$"), "cost: 5$");
        assert_eq!(expand_env("a$ b"), "a$ b");
    }
}
