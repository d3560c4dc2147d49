use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// A row from the intake_batches table. Immutable once written.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawBatch {
    pub id: i64,
    pub source: String,
    pub received_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub source_version: Option<String>,
}

/// A row from the staged_events table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagedEvent {
    pub fingerprint: String,
    pub venue_id: i64,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub name: Option<String>,
    pub price_min_cents: Option<i64>,
    pub price_max_cents: Option<i64>,
    pub is_free: bool,
    pub description: Option<String>,
    pub age_restriction: String,
    pub ticket_url: Option<String>,
    pub event_url: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub quarantine_reasons: Vec<String>,
    pub content_hash: String,
    pub source_type: String,
    pub intake_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the published_events table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublishedEvent {
    pub fingerprint: String,
    pub venue_id: i64,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub name: Option<String>,
    pub price_min_cents: Option<i64>,
    pub price_max_cents: Option<i64>,
    pub is_free: bool,
    pub description: Option<String>,
    pub age_restriction: String,
    pub ticket_url: Option<String>,
    pub event_url: Option<String>,
    pub image_url: Option<String>,
    pub content_hash: String,
    pub first_published_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

/// Genre link for a staged event. First-listed genre is primary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GenreLink {
    pub fingerprint: String,
    pub genre_id: i64,
    pub position: i32,
    pub is_primary: bool,
}

/// Lineup link for a staged event. First-listed artist is the headliner.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtistLink {
    pub fingerprint: String,
    pub artist_id: i64,
    pub position: i32,
    pub is_headliner: bool,
}

/// Counts returned by one staging promotion run.
///
/// Malformed records are skipped and counted here, never surfaced as errors —
/// one bad document must not block the rest of the batch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PromoteOutcome {
    pub records_processed: u64,
    pub records_created: u64,
    pub records_failed: u64,
}

impl PromoteOutcome {
    pub fn records_updated(&self) -> u64 {
        self.records_processed - self.records_created
    }
}
