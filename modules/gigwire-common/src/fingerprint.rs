//! Content-derived identity for event records.
//!
//! The fingerprint is the sole deduplication key across all three data tiers.
//! It covers only the immutable identity fields (venue, date, start time) so
//! that a scraper's later correction to price or description updates the
//! existing row instead of creating a duplicate.

use chrono::{NaiveDate, NaiveTime};
use sha2::{Digest, Sha256};

use crate::types::RawEventRecord;

/// Stable identity hash for an event: SHA-256 over
/// `"{venue_id}-{YYYY-MM-DD}-{HH:MM:SS}"`, hex-encoded.
///
/// Deterministic regardless of which batch or source produced the record.
pub fn fingerprint(venue_id: i64, event_date: NaiveDate, start_time: NaiveTime) -> String {
    let canonical = format!(
        "{}-{}-{}",
        venue_id,
        event_date.format("%Y-%m-%d"),
        start_time.format("%H:%M:%S")
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash over the full record content, volatile fields and association lists
/// included. Two staged snapshots of the same fingerprint compare equal iff
/// nothing about the event changed — this drives content-based republish.
pub fn content_hash(record: &RawEventRecord) -> String {
    // Struct field order is fixed, so the JSON serialization is canonical.
    let canonical =
        serde_json::to_string(record).expect("RawEventRecord serializes infallibly");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
