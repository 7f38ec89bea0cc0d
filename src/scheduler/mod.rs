//! Per-check schedule loops and the top-level fan-out.
//!
//! Every enabled check gets its own task running an infinite
//! execute-record-sleep cycle. Loops share nothing with each other beyond
//! the outcome and assertion sinks; a check that hangs or fails forever
//! occupies only its own loop. Cancellation is checked after each cycle
//! and during the sleep, so shutdown lets an in-flight check finish and
//! never interrupts a recording.

mod timing;

pub use timing::next_wake;

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::assertions::AssertionSink;
use crate::config::CheckerConfig;
use crate::discovery::CheckDescriptor;
use crate::metrics::OutcomeSink;
use crate::runner::CheckExecutor;

// ============================================================================
// ScheduleLoop
// ============================================================================

/// Infinite scheduling loop for a single check.
pub struct ScheduleLoop {
    check: CheckDescriptor,
    interval: Duration,
    executor: Arc<dyn CheckExecutor>,
    outcomes: Arc<dyn OutcomeSink>,
    assertions: Option<Arc<dyn AssertionSink>>,
    cancel_token: CancellationToken,
}

impl ScheduleLoop {
    pub fn new(
        check: CheckDescriptor,
        interval: Duration,
        executor: Arc<dyn CheckExecutor>,
        outcomes: Arc<dyn OutcomeSink>,
        assertions: Option<Arc<dyn AssertionSink>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            check,
            interval,
            executor,
            outcomes,
            assertions,
            cancel_token,
        }
    }

    /// Run cycles until cancelled. Cycles within this loop are strictly
    /// sequential; the next one never starts before the previous outcome
    /// is recorded.
    pub async fn run(self) {
        info!(
            check = %self.check.name,
            interval_secs = self.interval.as_secs(),
            "Schedule loop started"
        );

        loop {
            self.run_cycle().await;

            if self.cancel_token.is_cancelled() || !self.wait_for_next_tick().await {
                break;
            }
        }

        info!(check = %self.check.name, "Schedule loop stopped");
    }

    /// One cycle: execute, record, raise the assertion when configured.
    ///
    /// Every outcome is recorded and the loop moves on - no retries, no
    /// backoff, no disabling of failing checks.
    pub async fn run_cycle(&self) {
        let success = self.executor.execute(&self.check).await;

        info!(check = %self.check.name, success, "Check completed");
        self.outcomes.record(&self.check.name, success);

        if let Some(assertions) = &self.assertions {
            assertions.always(
                success,
                "check run succeeded",
                serde_json::json!({ "check": self.check.name, "success": success }),
            );
        }
    }

    /// Sleep until the next phase-aligned tick. Returns `false` when the
    /// sleep was cut short by cancellation.
    async fn wait_for_next_tick(&self) -> bool {
        let now = SystemTime::now();
        let target = next_wake(now, self.interval);
        let delay = target.duration_since(now).unwrap_or_default();

        trace!(
            check = %self.check.name,
            until = %chrono::DateTime::<chrono::Utc>::from(target).to_rfc3339(),
            "Blocking until next tick"
        );

        tokio::select! {
            _ = self.cancel_token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Fans discovered checks out into one [`ScheduleLoop`] per enabled check.
pub struct Scheduler {
    executor: Arc<dyn CheckExecutor>,
    outcomes: Arc<dyn OutcomeSink>,
    assertions: Option<Arc<dyn AssertionSink>>,
}

impl Scheduler {
    pub fn new(
        executor: Arc<dyn CheckExecutor>,
        outcomes: Arc<dyn OutcomeSink>,
        assertions: Option<Arc<dyn AssertionSink>>,
    ) -> Self {
        Self {
            executor,
            outcomes,
            assertions,
        }
    }

    /// Resolve each check's config, spawn a loop per enabled check, and
    /// block until every loop has exited.
    ///
    /// With no enabled checks this logs a warning and returns immediately
    /// instead of waiting forever on zero workers.
    pub async fn run(
        &self,
        checks: Vec<CheckDescriptor>,
        config: &CheckerConfig,
        cancel_token: CancellationToken,
    ) {
        let mut loops = JoinSet::new();

        for check in checks {
            let resolved = config.check_config(&check.name);
            if !resolved.enabled {
                debug!(check = %check.name, "Skipping disabled check");
                continue;
            }

            let schedule_loop = ScheduleLoop::new(
                check,
                resolved.interval,
                Arc::clone(&self.executor),
                Arc::clone(&self.outcomes),
                self.assertions.clone(),
                cancel_token.clone(),
            );
            loops.spawn(schedule_loop.run());
        }

        if loops.is_empty() {
            warn!("No enabled checks, scheduler has nothing to do");
            return;
        }

        info!(checks = loops.len(), "Scheduler started");

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Schedule loop aborted");
            }
        }

        info!("Scheduler stopped");
    }
}
