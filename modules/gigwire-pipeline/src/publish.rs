//! Publish workflow — audit first, then promote the clean backlog.
//!
//! Nothing reaches the published tier past an unresolved audit failure:
//! the store's one guarantee is that everything in it passed audit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::audit::Auditor;
use crate::error::Result;
use crate::staging::StagingStore;
use crate::types::{PublishedEvent, StagedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Success,
    Failed,
}

/// Caller-visible result of one auto-publish run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub status: PublishStatus,
    pub error_count: u64,
    pub quarantined_count: u64,
    pub published_count: u64,
    pub message: String,
}

/// The externally visible store. Written only from clean staged events.
#[derive(Clone)]
pub struct PublishedStore {
    pool: PgPool,
}

impl PublishedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert one staged event into the published tier, keyed by the same
    /// fingerprint. Republishing identical content rewrites identical rows;
    /// the backlog query upstream already filters those out.
    pub async fn publish(&self, event: &StagedEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO published_events (
                fingerprint, venue_id, event_date, start_time, end_time, name,
                price_min_cents, price_max_cents, is_free, description,
                age_restriction, ticket_url, event_url, image_url, content_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (fingerprint) DO UPDATE SET
                end_time        = EXCLUDED.end_time,
                name            = EXCLUDED.name,
                price_min_cents = EXCLUDED.price_min_cents,
                price_max_cents = EXCLUDED.price_max_cents,
                is_free         = EXCLUDED.is_free,
                description     = EXCLUDED.description,
                age_restriction = EXCLUDED.age_restriction,
                ticket_url      = EXCLUDED.ticket_url,
                event_url       = EXCLUDED.event_url,
                image_url       = EXCLUDED.image_url,
                content_hash    = EXCLUDED.content_hash,
                published_at    = now()
            "#,
        )
        .bind(&event.fingerprint)
        .bind(event.venue_id)
        .bind(event.event_date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.name)
        .bind(event.price_min_cents)
        .bind(event.price_max_cents)
        .bind(event.is_free)
        .bind(&event.description)
        .bind(&event.age_restriction)
        .bind(&event.ticket_url)
        .bind(&event.event_url)
        .bind(&event.image_url)
        .bind(&event.content_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<PublishedEvent>> {
        let row = sqlx::query_as::<_, PublishedEvent>(
            "SELECT * FROM published_events WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM published_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }
}

#[derive(Clone)]
pub struct PublishWorkflow {
    auditor: Auditor,
    staging: StagingStore,
    published: PublishedStore,
}

impl PublishWorkflow {
    pub fn new(auditor: Auditor, staging: StagingStore, published: PublishedStore) -> Self {
        Self {
            auditor,
            staging,
            published,
        }
    }

    /// Write-Audit-Publish: run the auditor, halt on any violation, otherwise
    /// promote up to `batch_size` clean events whose content is new or changed
    /// since their last publish.
    ///
    /// Each publish is one atomic upsert, so a crash mid-run leaves a
    /// resumable prefix published and nothing half-written.
    pub async fn auto_publish(&self, batch_size: i64, now: DateTime<Utc>) -> Result<PublishOutcome> {
        let finding = self.auditor.run(now).await?;

        if !finding.passed() {
            let message = format!(
                "Audit failed, publish halted ({} violation(s): {})",
                finding.error_count,
                finding.summary_line()
            );
            warn!(
                errors = finding.error_count,
                quarantined = finding.quarantined_count,
                "Publish halted by audit gate"
            );
            return Ok(PublishOutcome {
                status: PublishStatus::Failed,
                error_count: finding.error_count,
                quarantined_count: finding.quarantined_count,
                published_count: 0,
                message,
            });
        }

        let backlog = self.staging.publish_backlog(batch_size).await?;

        let mut published_count = 0u64;
        for event in &backlog {
            self.published.publish(event).await?;
            published_count += 1;
        }

        info!(published = published_count, "Publish run complete");

        Ok(PublishOutcome {
            status: PublishStatus::Success,
            error_count: 0,
            quarantined_count: finding.quarantined_count,
            published_count,
            message: format!("Published {published_count} event(s)"),
        })
    }
}
