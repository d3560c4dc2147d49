//! Integration tests for the write-audit-publish pipeline.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;

use gigwire_common::{EventStatus, RawEventRecord, SourceType};
use gigwire_pipeline::{AuditPolicy, Pipeline, PipelineError, PromoteOutcome, PublishStatus};

/// Tests share one database, so they run one at a time.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

/// Fixed audit clock — rule evaluation takes `now` explicitly, so tests never
/// depend on the wall clock.
fn audit_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn time(s: &str) -> NaiveTime {
    s.parse().unwrap()
}

/// A valid, auditable record: near-future date, coherent times and pricing.
fn valid_record(venue_id: i64, event_date: &str, start: &str) -> RawEventRecord {
    let mut record = RawEventRecord::new(venue_id, date(event_date), time(start));
    record.event_name = Some("Techno Night".to_string());
    record.end_time = Some(time("23:00:00"));
    record.price_min_cents = Some(2000);
    record.price_max_cents = Some(3000);
    record.genre_ids = vec![3, 1];
    record.artist_ids = vec![7, 5];
    record
}

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    gigwire_pipeline::run_migrations(&pool).await.ok()?;

    // Clean slate for each test
    sqlx::query(
        "TRUNCATE intake_batches, staged_events, event_genres, event_artists, published_events \
         RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .ok()?;

    Some(pool)
}

async fn ingest(pipeline: &Pipeline, records: &[RawEventRecord]) -> (i64, PromoteOutcome) {
    let payload = serde_json::to_value(records).unwrap();
    let batch_id = pipeline
        .intake
        .append("test_scraper", payload, Some("v1"))
        .await
        .unwrap();
    let outcome = pipeline
        .transformer
        .promote(batch_id, SourceType::Scraper)
        .await
        .unwrap();
    (batch_id, outcome)
}

// =========================================================================
// Intake
// =========================================================================

#[tokio::test]
async fn intake_batch_roundtrips_as_received() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let payload = serde_json::json!([
        {"venue_id": 1, "event_date": "2026-08-10", "start_time": "20:00:00"},
        {"anything": "goes, intake stores documents verbatim"},
    ]);

    let batch_id = pipeline
        .intake
        .append("eventbrite", payload.clone(), Some("v2.1"))
        .await
        .unwrap();

    let batch = pipeline.intake.read(batch_id).await.unwrap();
    assert_eq!(batch.id, batch_id);
    assert_eq!(batch.source, "eventbrite");
    assert_eq!(batch.source_version.as_deref(), Some("v2.1"));
    assert_eq!(batch.payload, payload);
}

#[tokio::test]
async fn unknown_batch_fails_hard() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let err = pipeline
        .transformer
        .promote(99_999, SourceType::Scraper)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::BatchNotFound(99_999)));
}

// =========================================================================
// Idempotent staging
// =========================================================================

#[tokio::test]
async fn replayed_record_updates_instead_of_duplicating() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let record = valid_record(1, "2026-08-10", "20:00:00");

    let (_, first) = ingest(&pipeline, &[record.clone()]).await;
    assert_eq!(first.records_processed, 1);
    assert_eq!(first.records_created, 1);

    // Scraper resubmits the identical payload (at-least-once delivery).
    let (_, second) = ingest(&pipeline, &[record.clone()]).await;
    assert_eq!(second.records_processed, 1);
    assert_eq!(second.records_created, 0);
    assert_eq!(second.records_updated(), 1);

    assert_eq!(pipeline.staging.count().await.unwrap(), 1);
}

#[tokio::test]
async fn reupsert_overwrites_volatile_fields_with_latest() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let mut record = valid_record(1, "2026-08-10", "20:00:00");
    ingest(&pipeline, &[record.clone()]).await;

    // A later scrape corrects price and description — same identity.
    record.price_min_cents = Some(2500);
    record.description = Some("Lineup updated".to_string());
    let (batch_id, outcome) = ingest(&pipeline, &[record.clone()]).await;
    assert_eq!(outcome.records_created, 0);

    let staged = pipeline
        .staging
        .get(&record.fingerprint())
        .await
        .unwrap()
        .expect("staged row exists");
    assert_eq!(staged.price_min_cents, Some(2500));
    assert_eq!(staged.description.as_deref(), Some("Lineup updated"));
    assert_eq!(staged.intake_id, batch_id, "provenance follows the latest batch");
    assert!(staged.updated_at >= staged.created_at);
}

#[tokio::test]
async fn associations_replace_never_accumulate() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let mut record = valid_record(1, "2026-08-10", "20:00:00");
    record.genre_ids = vec![3, 1, 2];
    record.artist_ids = vec![7, 5];
    ingest(&pipeline, &[record.clone()]).await;

    let fp = record.fingerprint();
    assert_eq!(pipeline.staging.genres_for(&fp).await.unwrap().len(), 3);

    // Upstream dropped two genres and one artist — replay must not leave orphans.
    record.genre_ids = vec![9];
    record.artist_ids = vec![5];
    ingest(&pipeline, &[record.clone()]).await;

    let genres = pipeline.staging.genres_for(&fp).await.unwrap();
    assert_eq!(genres.len(), 1);
    assert_eq!(genres[0].genre_id, 9);
    assert!(genres[0].is_primary);

    let artists = pipeline.staging.artists_for(&fp).await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].artist_id, 5);
    assert!(artists[0].is_headliner);
}

#[tokio::test]
async fn first_listed_association_is_flagged() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let mut record = valid_record(1, "2026-08-10", "20:00:00");
    record.genre_ids = vec![4, 2, 8];
    record.artist_ids = vec![11, 3, 6];
    ingest(&pipeline, &[record.clone()]).await;

    let fp = record.fingerprint();

    let genres = pipeline.staging.genres_for(&fp).await.unwrap();
    assert_eq!(
        genres.iter().map(|g| (g.genre_id, g.position, g.is_primary)).collect::<Vec<_>>(),
        vec![(4, 0, true), (2, 1, false), (8, 2, false)]
    );

    let artists = pipeline.staging.artists_for(&fp).await.unwrap();
    assert_eq!(
        artists.iter().map(|a| (a.artist_id, a.position, a.is_headliner)).collect::<Vec<_>>(),
        vec![(11, 1, true), (3, 2, false), (6, 3, false)]
    );
}

#[tokio::test]
async fn malformed_record_skipped_rest_of_batch_continues() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool.clone(), AuditPolicy::default());

    // Middle document is missing its venue — an identity field.
    let payload = serde_json::json!([
        {"venue_id": 1, "event_date": "2026-08-10", "start_time": "20:00:00", "price_min_cents": 2000},
        {"event_date": "2026-08-11", "start_time": "20:00:00"},
        {"venue_id": 2, "event_date": "2026-08-12", "start_time": "21:00:00", "price_min_cents": 1500},
    ]);

    let batch_id = pipeline
        .intake
        .append("test_scraper", payload, None)
        .await
        .unwrap();
    let outcome = pipeline
        .transformer
        .promote(batch_id, SourceType::Scraper)
        .await
        .unwrap();

    assert_eq!(outcome.records_processed, 2);
    assert_eq!(outcome.records_created, 2);
    assert_eq!(outcome.records_failed, 1);
    assert_eq!(pipeline.staging.count().await.unwrap(), 2);
}

// =========================================================================
// Audit
// =========================================================================

#[tokio::test]
async fn audit_quarantines_violators_and_spares_the_clean() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let good = valid_record(2, "2026-08-15", "20:00:00");
    let mut records = gigwire_scraper::bad_event_fixtures(audit_now().date_naive());
    records.push(good.clone());
    ingest(&pipeline, &records).await;

    let finding = pipeline.auditor.run(audit_now()).await.unwrap();
    assert_eq!(finding.quarantined_count, 4);
    assert!(finding.error_count >= 4);
    assert_eq!(finding.summary.len(), 4, "all four rule kinds hit once each");

    let staged_good = pipeline
        .staging
        .get(&good.fingerprint())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staged_good.status, "clean");

    assert_eq!(
        pipeline
            .staging
            .count_by_status(EventStatus::Quarantined)
            .await
            .unwrap(),
        4
    );
}

#[tokio::test]
async fn audit_records_all_violated_kinds_on_one_row() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    // Past date AND inverted times AND free-with-price, all at once.
    let mut record = valid_record(1, "2026-07-01", "23:00:00");
    record.end_time = Some(time("20:00:00"));
    record.is_free = true;
    ingest(&pipeline, &[record.clone()]).await;

    let finding = pipeline.auditor.run(audit_now()).await.unwrap();
    assert_eq!(finding.quarantined_count, 1);
    assert_eq!(finding.error_count, 3);

    let staged = pipeline
        .staging
        .get(&record.fingerprint())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staged.status, "quarantined");
    assert_eq!(
        staged.quarantine_reasons,
        vec!["past_date", "end_before_start", "price_conflict"]
    );
}

#[tokio::test]
async fn audit_is_idempotent() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let records = gigwire_scraper::bad_event_fixtures(audit_now().date_naive());
    ingest(&pipeline, &records).await;

    let first = pipeline.auditor.run(audit_now()).await.unwrap();
    assert_eq!(first.quarantined_count, 4);

    // No staging changes in between: the second pass finds nothing new.
    let second = pipeline.auditor.run(audit_now()).await.unwrap();
    assert_eq!(second.error_count, 0);
    assert_eq!(second.quarantined_count, 0);
    assert!(second.passed());
}

#[tokio::test]
async fn reupsert_does_not_clear_quarantine_but_next_audit_does() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    // Free event carrying a price — quarantined on first audit.
    let mut record = valid_record(1, "2026-08-10", "20:00:00");
    record.is_free = true;
    record.price_min_cents = Some(2000);
    record.price_max_cents = None;
    ingest(&pipeline, &[record.clone()]).await;
    pipeline.auditor.run(audit_now()).await.unwrap();

    let fp = record.fingerprint();
    assert_eq!(
        pipeline.staging.get(&fp).await.unwrap().unwrap().status,
        "quarantined"
    );

    // Source corrects the record. Same identity, so same fingerprint.
    record.price_min_cents = None;
    ingest(&pipeline, &[record.clone()]).await;

    // Ingestion alone must not lift the hold.
    let staged = pipeline.staging.get(&fp).await.unwrap().unwrap();
    assert_eq!(staged.status, "quarantined");
    assert_eq!(staged.price_min_cents, None, "content still updates");

    // The next audit pass re-evaluates and requalifies it.
    let finding = pipeline.auditor.run(audit_now()).await.unwrap();
    assert_eq!(finding.requalified_count, 1);
    assert_eq!(finding.error_count, 0);
    assert_eq!(
        pipeline.staging.get(&fp).await.unwrap().unwrap().status,
        "clean"
    );
}

// =========================================================================
// Publish
// =========================================================================

#[tokio::test]
async fn publish_gate_halts_on_violations() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let good = valid_record(2, "2026-08-15", "20:00:00");
    let mut records = gigwire_scraper::bad_event_fixtures(audit_now().date_naive());
    records.push(good);
    ingest(&pipeline, &records).await;

    let outcome = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(outcome.status, PublishStatus::Failed);
    assert!(outcome.error_count >= 1);
    assert_eq!(outcome.published_count, 0);
    assert!(outcome.message.contains("publish halted"));

    assert_eq!(pipeline.published.count().await.unwrap(), 0);
}

#[tokio::test]
async fn publish_proceeds_once_violators_are_quarantined() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let good = valid_record(2, "2026-08-15", "20:00:00");
    let mut records = gigwire_scraper::bad_event_fixtures(audit_now().date_naive());
    records.push(good.clone());
    ingest(&pipeline, &records).await;

    // First run halts and quarantines; the bad rows are now isolated.
    let first = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(first.status, PublishStatus::Failed);

    // Second run sees a clean backlog and publishes only the good event.
    let second = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(second.status, PublishStatus::Success);
    assert_eq!(second.published_count, 1);

    assert_eq!(pipeline.published.count().await.unwrap(), 1);
    assert!(pipeline
        .published
        .get(&good.fingerprint())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn publish_is_idempotent_for_unchanged_content() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let record = valid_record(1, "2026-08-10", "20:00:00");
    ingest(&pipeline, &[record.clone()]).await;

    let first = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(first.status, PublishStatus::Success);
    assert_eq!(first.published_count, 1);

    // Nothing changed since: the backlog is empty, the run is a no-op.
    let second = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(second.status, PublishStatus::Success);
    assert_eq!(second.published_count, 0);

    assert_eq!(pipeline.published.count().await.unwrap(), 1);
}

#[tokio::test]
async fn changed_content_is_republished() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let mut record = valid_record(1, "2026-08-10", "20:00:00");
    ingest(&pipeline, &[record.clone()]).await;
    pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();

    // Price correction lands after the first publish.
    record.price_min_cents = Some(2500);
    ingest(&pipeline, &[record.clone()]).await;

    let outcome = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(outcome.published_count, 1);

    let published = pipeline
        .published
        .get(&record.fingerprint())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.price_min_cents, Some(2500));
    assert_eq!(pipeline.published.count().await.unwrap(), 1, "overwrite, not duplicate");
}

#[tokio::test]
async fn publish_respects_batch_size_and_resumes() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let records: Vec<_> = (1..=5)
        .map(|venue| valid_record(venue, "2026-08-15", "20:00:00"))
        .collect();
    ingest(&pipeline, &records).await;

    let first = pipeline.publisher.auto_publish(2, audit_now()).await.unwrap();
    assert_eq!(first.published_count, 2);
    assert_eq!(pipeline.published.count().await.unwrap(), 2);

    let second = pipeline.publisher.auto_publish(2, audit_now()).await.unwrap();
    assert_eq!(second.published_count, 2);

    let third = pipeline.publisher.auto_publish(2, audit_now()).await.unwrap();
    assert_eq!(third.published_count, 1);
    assert_eq!(pipeline.published.count().await.unwrap(), 5);
}

#[tokio::test]
async fn quarantined_row_never_reaches_published_store() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let mut bad = valid_record(1, "2026-08-10", "20:00:00");
    bad.is_free = true;
    bad.price_min_cents = Some(2000);
    ingest(&pipeline, &[bad.clone()]).await;

    // Quarantine it, then publish: the backlog must not include it.
    pipeline.auditor.run(audit_now()).await.unwrap();
    let outcome = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(outcome.status, PublishStatus::Success);
    assert_eq!(outcome.published_count, 0);
    assert!(pipeline
        .published
        .get(&bad.fingerprint())
        .await
        .unwrap()
        .is_none());
}

// =========================================================================
// End-to-end scenarios
// =========================================================================

#[tokio::test]
async fn full_wap_cycle_for_a_clean_event() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let record = valid_record(1, "2026-08-10", "20:00:00");

    let (_, first) = ingest(&pipeline, &[record.clone()]).await;
    assert_eq!((first.records_processed, first.records_created), (1, 1));

    let (_, replay) = ingest(&pipeline, &[record.clone()]).await;
    assert_eq!((replay.records_processed, replay.records_created), (1, 0));

    let finding = pipeline.auditor.run(audit_now()).await.unwrap();
    assert_eq!(finding.error_count, 0);

    let outcome = pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();
    assert_eq!(outcome.status, PublishStatus::Success);
    assert_eq!(outcome.published_count, 1);
}

#[tokio::test]
async fn metrics_reflect_tier_counts() {
    let _guard = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let pipeline = Pipeline::new(pool, AuditPolicy::default());

    let good_a = valid_record(1, "2026-08-10", "20:00:00");
    let good_b = valid_record(2, "2026-08-11", "21:00:00");
    let mut bad = valid_record(3, "2026-08-12", "20:00:00");
    bad.is_free = true;
    bad.price_min_cents = Some(1000);
    ingest(&pipeline, &[good_a, good_b, bad]).await;

    pipeline.auditor.run(audit_now()).await.unwrap();
    pipeline.publisher.auto_publish(500, audit_now()).await.unwrap();

    let metrics = pipeline.metrics().await.unwrap();
    assert_eq!(metrics.intake_batches, 1);
    assert_eq!(metrics.staged_total, 3);
    assert_eq!(metrics.staged_clean, 2);
    assert_eq!(metrics.staged_quarantined, 1);
    assert_eq!(metrics.published, 2);
}
