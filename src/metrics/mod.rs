//! Outcome recording and Prometheus exposition.
//!
//! The scheduler records every completed cycle through the [`OutcomeSink`]
//! trait; the shipped implementation accumulates into an owned
//! `prometheus` registry served by a small axum app. The registry is
//! injected rather than process-global so tests can read counters back
//! from an isolated instance.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Counter name exposed to scrapers.
const OUTCOME_METRIC: &str = "status_check";

/// Concurrency-safe accumulator for completed check cycles.
///
/// Implementations must support concurrent recording from arbitrarily many
/// schedule loops without external locking.
pub trait OutcomeSink: Send + Sync {
    /// Record one completed cycle for `check`.
    fn record(&self, check: &str, success: bool);
}

/// [`OutcomeSink`] backed by a `status_check{check,success}` counter.
#[derive(Clone)]
pub struct PrometheusSink {
    registry: Registry,
    outcomes: IntCounterVec,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let outcomes = IntCounterVec::new(
            Opts::new(
                OUTCOME_METRIC,
                "Completed check executions by check name and outcome.",
            ),
            &["check", "success"],
        )?;
        registry.register(Box::new(outcomes.clone()))?;
        Ok(Self { registry, outcomes })
    }

    /// The registry backing this sink, for the exposition endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Read back the current count for one `(check, outcome)` pair.
    pub fn value(&self, check: &str, success: bool) -> u64 {
        self.outcomes
            .with_label_values(&[check, bool_label(success)])
            .get()
    }
}

impl OutcomeSink for PrometheusSink {
    fn record(&self, check: &str, success: bool) {
        self.outcomes
            .with_label_values(&[check, bool_label(success)])
            .inc();
    }
}

fn bool_label(success: bool) -> &'static str {
    if success {
        "true"
    } else {
        "false"
    }
}

// ============================================================================
// HTTP exposition
// ============================================================================

#[derive(Clone)]
struct MetricsState {
    registry: Registry,
}

/// Build the exposition app: `GET /metrics` and `GET /health`.
pub fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/health", get(serve_health))
        .layer(TraceLayer::new_for_http())
        .with_state(MetricsState { registry })
}

/// GET /metrics - Prometheus text exposition of the registry.
async fn serve_metrics(State(state): State<MetricsState>) -> Response {
    let families = state.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "encoding failure").into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type())],
        buffer,
    )
        .into_response()
}

/// GET /health - liveness probe for the daemon itself.
async fn serve_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Serve the exposition app until the cancellation token fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            info!("Metrics server received shutdown signal");
        })
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_increments_exactly_one_label_pair() {
        let sink = PrometheusSink::new().unwrap();

        sink.record("a.sh", true);
        sink.record("a.sh", true);
        sink.record("b.sh", false);

        assert_eq!(sink.value("a.sh", true), 2);
        assert_eq!(sink.value("a.sh", false), 0);
        assert_eq!(sink.value("b.sh", false), 1);
        assert_eq!(sink.value("b.sh", true), 0);
    }

    #[test]
    fn exposition_contains_labeled_samples() {
        let sink = PrometheusSink::new().unwrap();
        sink.record("net/ping.sh", true);

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&sink.registry().gather(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("status_check{check=\"net/ping.sh\",success=\"true\"} 1"));
    }
}
