//! Phase-aligned wake-time computation.
//!
//! Instead of sleeping a flat `interval` from "now" (which keeps every
//! check that started together firing together), each loop wakes at the
//! multiple of its interval nearest to `now + interval/2`, measured from
//! the Unix epoch. Checks sharing an interval spread across the window
//! while each individual schedule stays deterministic.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Next wake point: `round(now + interval/2, interval)` against the epoch,
/// rounding half up.
///
/// The result is always a multiple of `interval`, never before `now`, and
/// never more than one full `interval` after it.
pub fn next_wake(now: SystemTime, interval: Duration) -> SystemTime {
    let since_epoch = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let interval_nanos = interval.as_nanos().max(1);

    let shifted = since_epoch + interval_nanos / 2;
    let remainder = shifted % interval_nanos;
    let rounded = if remainder * 2 >= interval_nanos {
        shifted - remainder + interval_nanos
    } else {
        shifted - remainder
    };

    UNIX_EPOCH + nanos_to_duration(rounded)
}

fn nanos_to_duration(nanos: u128) -> Duration {
    Duration::new(
        (nanos / 1_000_000_000) as u64,
        (nanos % 1_000_000_000) as u32,
    )
}
