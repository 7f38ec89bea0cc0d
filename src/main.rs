//! status-checker daemon entry point.
//!
//! # Usage
//!
//! ```bash
//! # Run with the standard config search path
//! status-checker
//!
//! # Run with an explicit config file
//! status-checker /etc/status-checker/config.toml
//!
//! # Point at a different checks directory without a config file
//! status-checker --checks-dir ./probes
//! ```
//!
//! # Environment Variables
//!
//! - `STATUS_CHECKER_CONFIG`: path to the config file
//! - `STATUS_CHECKER_CHECKS_DIR`, `STATUS_CHECKER_INTERVAL_SECS`, ...:
//!   override individual top-level config keys
//! - `RUST_LOG`: tracing filter (overrides `logs.level` from the config)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use status_checker::assertions::{AssertionSink, LogAssertionSink};
use status_checker::config::{defaults, CheckerConfig, ConfigSource};
use status_checker::discovery;
use status_checker::metrics::{self, PrometheusSink};
use status_checker::runner::ProcessRunner;
use status_checker::scheduler::Scheduler;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "status-checker")]
#[command(about = "Periodic health-probe runner with Prometheus exposition")]
#[command(version)]
struct CliArgs {
    /// Path to the config file (default: search standard locations)
    config: Option<PathBuf>,

    /// Override the checks directory
    #[arg(long, value_name = "DIR")]
    checks_dir: Option<String>,

    /// Override the metrics endpoint port
    #[arg(long, value_name = "PORT")]
    prom_port: Option<u16>,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    MetricsServer,
    Scheduler,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::MetricsServer => write!(f, "MetricsServer"),
            TaskName::Scheduler => write!(f, "Scheduler"),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Initialize the tracing subscriber. `RUST_LOG` wins over the config
/// level; `logs.pretty` selects human-readable output over JSON.
fn init_tracing(config: &CheckerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logs.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logs.pretty {
        builder.init();
    } else {
        builder.json().init();
    }
}

fn log_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::CommandLine(path) => {
            info!(path = %path.display(), "Loaded config from command line");
        }
        ConfigSource::EnvVar(path) => {
            info!(path = %path.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
        }
        ConfigSource::SearchPath(path) => {
            info!(path = %path.display(), "Loaded config");
        }
        ConfigSource::Defaults => {
            warn!("No config file found, using defaults");
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Monitor tasks, cancel everything on the first failure, and drain the
/// rest within a bounded grace period once shutdown begins.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            joined = task_set.join_next() => {
                match joined {
                    Some(Ok(Ok(task_name))) => {
                        info!(task = %task_name, "Supervisor: task completed");
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Supervisor: task failed");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("task panicked: {e}"));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        return Ok(());
                    }
                }
            }
        }
    }

    let grace = Duration::from_secs(defaults::SHUTDOWN_GRACE_SECS);
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = task_set.join_next().await {
            match joined {
                Ok(Ok(task_name)) => info!(task = %task_name, "Supervisor: task drained"),
                Ok(Err(e)) => warn!(error = %e, "Supervisor: task failed during shutdown"),
                Err(e) => warn!(error = %e, "Supervisor: task panicked during shutdown"),
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            grace_secs = grace.as_secs(),
            "Supervisor: grace period expired, aborting remaining tasks"
        );
        task_set.shutdown().await;
    }

    info!("Shutdown complete");
    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let (mut config, source) =
        CheckerConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = args.checks_dir {
        config.checks_dir = dir;
    }
    if let Some(port) = args.prom_port {
        config.prom_port = port;
    }

    init_tracing(&config);
    log_config_source(&source);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        checks_dir = %config.checks_dir,
        interval_secs = config.interval_secs,
        prom_port = config.prom_port,
        "Starting status-checker"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    // Metrics sink and exposition endpoint. Binding failures are fatal -
    // an unscrapable checker is not doing its job.
    let sink = Arc::new(PrometheusSink::new().context("Failed to build metrics registry")?);
    let addr = format!("0.0.0.0:{}", config.prom_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {addr}"))?;
    info!(%addr, "Metrics endpoint listening");

    // Discovery. A missing root is fatal; an empty root is a clean exit.
    let checks = discovery::discover(Path::new(&config.checks_dir), config.modify_permissions)
        .context("Failed to discover checks")?;
    if checks.is_empty() {
        warn!(checks_dir = %config.checks_dir, "No checks found");
        cancel_token.cancel();
        return Ok(());
    }
    info!(count = checks.len(), checks_dir = %config.checks_dir, "Discovered checks");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task: metrics HTTP server
    let app = metrics::metrics_router(sink.registry().clone());
    let server_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[MetricsServer] Task starting");
        metrics::serve(listener, app, server_cancel).await?;
        info!("[MetricsServer] Graceful shutdown complete");
        Ok(TaskName::MetricsServer)
    });

    // Task: scheduler fan-out, one loop per enabled check
    let assertions: Option<Arc<dyn AssertionSink>> = config
        .assertions
        .then(|| Arc::new(LogAssertionSink) as Arc<dyn AssertionSink>);
    let scheduler = Scheduler::new(Arc::new(ProcessRunner::new()), sink, assertions);
    let scheduler_cancel = cancel_token.clone();
    let scheduler_config = config.clone();
    task_set.spawn(async move {
        info!("[Scheduler] Task starting");
        scheduler
            .run(checks, &scheduler_config, scheduler_cancel.clone())
            .await;
        // Loops only end on cancellation or zero enabled checks; either
        // way the metrics server should come down with them.
        scheduler_cancel.cancel();
        Ok(TaskName::Scheduler)
    });

    run_supervisor(&mut task_set, cancel_token).await
}
