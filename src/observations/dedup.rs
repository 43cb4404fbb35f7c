//! Write-time deduplication
//!
//! A candidate observation is compared against the most recent stored
//! observation for the same (device, sensor, quantity kind) whose time lies
//! inside a trailing window anchored at the candidate's own time. Unchanged
//! values are dropped; any change is kept, so oscillating values (A, B, A)
//! all survive.

use chrono::{DateTime, Duration, Utc};

use super::{Observation, ObservedValue};

/// Length of the trailing window in seconds
pub const DEDUP_WINDOW_SECS: i64 = 60;

/// Exclusive lower bound of the window for a candidate time.
///
/// A stored observation is in the window when its time is strictly greater
/// than this value.
pub fn window_start(candidate_time: DateTime<Utc>) -> DateTime<Utc> {
    candidate_time - Duration::seconds(DEDUP_WINDOW_SECS)
}

/// Decide whether `candidate` is stored, given the latest in-window value.
pub fn should_persist(candidate: &Observation, last_in_window: Option<&ObservedValue>) -> bool {
    match last_in_window {
        None => true,
        Some(last) => !same_value(candidate, last),
    }
}

fn same_value(candidate: &Observation, last: &ObservedValue) -> bool {
    candidate.value == last.value
        && candidate.value_string == last.value_string
        && candidate.value_boolean == last.value_boolean
}
