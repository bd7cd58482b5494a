//! De-duplication and time bucketing.

use std::collections::HashSet;

use crate::domain::{Timestamped, UniqueKeyed};

/// Removes events sharing a unique key, keeping the last occurrence. Kept
/// events stay in input order.
#[must_use]
pub fn dedup_by_key<T: UniqueKeyed>(events: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(events.len());
    let mut kept: Vec<T> = events
        .into_iter()
        .rev()
        .filter(|event| seen.insert(event.unique_key().to_string()))
        .collect();
    kept.reverse();
    kept
}

/// Rounds `timestamp` down to a multiple of `bucket_secs`. A non-positive
/// width leaves the timestamp unchanged.
#[must_use]
pub const fn round_time(timestamp: i64, bucket_secs: i64) -> i64 {
    if bucket_secs <= 0 {
        return timestamp;
    }
    timestamp - timestamp.rem_euclid(bucket_secs)
}

/// Replaces every event timestamp with its bucket start. Events are never
/// merged here.
pub fn bucket_events<T: Timestamped>(events: &mut [T], bucket_secs: i64) {
    for event in events {
        event.set_timestamp(round_time(event.timestamp(), bucket_secs));
    }
}
