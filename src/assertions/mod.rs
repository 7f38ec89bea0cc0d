//! Assertion sink - an observation hook for external verification tooling.
//!
//! When assertion mode is on, the scheduler reports "this check cycle
//! succeeded" after every run, with the check name and outcome attached as
//! context. The sink never influences control flow; it only makes the
//! expected-invariant stream visible to whatever is listening.

use serde_json::Value;
use tracing::{debug, error};

/// Receiver for always-true assertions raised once per check cycle.
pub trait AssertionSink: Send + Sync {
    /// Assert that `condition` holds, with a JSON `details` payload.
    fn always(&self, condition: bool, message: &str, details: Value);
}

/// [`AssertionSink`] that reports through the log: violations at error
/// level, passes at debug level.
#[derive(Debug, Default)]
pub struct LogAssertionSink;

impl AssertionSink for LogAssertionSink {
    fn always(&self, condition: bool, message: &str, details: Value) {
        if condition {
            debug!(%details, "Assertion held: {message}");
        } else {
            error!(%details, "Assertion violated: {message}");
        }
    }
}
