//! Config Loading Tests
//!
//! Exercises the file → environment → default precedence chain and the
//! startup validation through the public loading entry points.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use status_checker::config::{CheckerConfig, ConfigSource};

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn file_values_override_defaults() {
    let (_dir, path) = write_config(
        r#"
interval_secs = 60
checks_dir = "/srv/probes"
prom_port = 9200
modify_permissions = true

[logs]
pretty = true
level = "debug"

[checks."slow.sh"]
interval_secs = 300
"#,
    );

    let config = CheckerConfig::load_from_file(&path).unwrap();
    assert_eq!(config.interval_secs, 60);
    assert_eq!(config.checks_dir, "/srv/probes");
    assert_eq!(config.prom_port, 9200);
    assert!(config.modify_permissions);
    assert!(config.logs.pretty);
    assert_eq!(config.logs.level, "debug");
    assert_eq!(
        config.check_config("slow.sh").interval,
        Duration::from_secs(300)
    );
    // Untouched keys keep their defaults.
    assert!(config.enabled_by_default);
    assert!(!config.assertions);
}

#[test]
fn explicit_path_reports_command_line_source() {
    let (_dir, path) = write_config("interval_secs = 15\n");
    let (config, source) = CheckerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.interval_secs, 15);
    assert_eq!(source, ConfigSource::CommandLine(path));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(CheckerConfig::load(Some(&missing)).is_err());
}

#[test]
fn invalid_values_fail_validation_on_load() {
    let (_dir, path) = write_config("interval_secs = 0\n");
    let err = CheckerConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("interval_secs"));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let (_dir, path) = write_config("interval_secs = [not a number\n");
    assert!(CheckerConfig::load_from_file(&path).is_err());
}

/// Environment interactions live in one test: the override variables are
/// process-global and the test harness runs tests concurrently.
#[test]
fn env_overrides_and_expansion_apply_on_load() {
    std::env::set_var("STATUS_CHECKER_PROM_PORT", "9555");
    std::env::set_var("STATUS_CHECKER_ASSERTIONS", "yes");
    std::env::set_var("STATUS_CHECKER_CFGTEST_ROOT", "/srv/checker");

    let (_dir, path) = write_config(
        r#"
prom_port = 9200
checks_dir = "${STATUS_CHECKER_CFGTEST_ROOT}/checks"
"#,
    );

    let (config, _source) = CheckerConfig::load(Some(&path)).unwrap();

    // Environment beats the file...
    assert_eq!(config.prom_port, 9555);
    assert!(config.assertions);
    // ...and references in string values are expanded.
    assert_eq!(config.checks_dir, "/srv/checker/checks");

    std::env::remove_var("STATUS_CHECKER_PROM_PORT");
    std::env::remove_var("STATUS_CHECKER_ASSERTIONS");
    std::env::remove_var("STATUS_CHECKER_CFGTEST_ROOT");
}
