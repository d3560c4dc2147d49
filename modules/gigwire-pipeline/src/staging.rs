//! StagingStore — the deduplicated working set, keyed by content fingerprint.
//!
//! Invariant: at most one row per fingerprint. The upsert is a single atomic
//! statement, so concurrent promoters of the same logical event race safely.
//! Quarantine status is auditor-owned; nothing here touches it except the
//! two explicit status flips the auditor calls.

use sqlx::PgPool;

use gigwire_common::{EventStatus, RawEventRecord, SourceType};

use crate::error::Result;
use crate::types::{ArtistLink, GenreLink, StagedEvent};

#[derive(Clone)]
pub struct StagingStore {
    pool: PgPool,
}

impl StagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert-or-update a staged event by fingerprint. Returns `true` when the
    /// fingerprint was new.
    ///
    /// Identity fields are never updated (same fingerprint means same venue,
    /// date, and start time); status and quarantine_reasons are left alone.
    /// `xmax = 0` holds exactly for rows created by this statement, which is
    /// how the insert and update paths are told apart in one round trip.
    pub async fn upsert_event(
        &self,
        fingerprint: &str,
        record: &RawEventRecord,
        source_type: SourceType,
        intake_id: i64,
        content_hash: &str,
    ) -> Result<bool> {
        let is_new = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO staged_events (
                fingerprint, venue_id, event_date, start_time, end_time, name,
                price_min_cents, price_max_cents, is_free, description,
                age_restriction, ticket_url, event_url, image_url,
                content_hash, source_type, intake_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
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
                source_type     = EXCLUDED.source_type,
                intake_id       = EXCLUDED.intake_id,
                updated_at      = now()
            RETURNING (xmax = 0) AS is_new
            "#,
        )
        .bind(fingerprint)
        .bind(record.venue_id)
        .bind(record.event_date)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(&record.event_name)
        .bind(record.price_min_cents)
        .bind(record.price_max_cents)
        .bind(record.is_free)
        .bind(&record.description)
        .bind(record.age_restriction.to_string())
        .bind(&record.ticket_url)
        .bind(&record.event_url)
        .bind(&record.image_url)
        .bind(content_hash)
        .bind(source_type.to_string())
        .bind(intake_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(is_new)
    }

    /// Replace the genre and lineup associations for a fingerprint with the
    /// given lists, in one transaction. Whole-set replace, never a merge —
    /// an association dropped upstream cannot survive a replay.
    pub async fn replace_associations(
        &self,
        fingerprint: &str,
        genre_ids: &[i64],
        artist_ids: &[i64],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM event_genres WHERE fingerprint = $1")
            .bind(fingerprint)
            .execute(&mut *tx)
            .await?;

        for (idx, genre_id) in genre_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO event_genres (fingerprint, genre_id, position, is_primary)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(fingerprint)
            .bind(genre_id)
            .bind(idx as i32)
            .bind(idx == 0)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM event_artists WHERE fingerprint = $1")
            .bind(fingerprint)
            .execute(&mut *tx)
            .await?;

        for (idx, artist_id) in artist_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO event_artists (fingerprint, artist_id, position, is_headliner)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(fingerprint)
            .bind(artist_id)
            .bind(idx as i32 + 1)
            .bind(idx == 0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<StagedEvent>> {
        let row = sqlx::query_as::<_, StagedEvent>(
            "SELECT * FROM staged_events WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All clean rows, for the audit scan.
    pub async fn clean_events(&self) -> Result<Vec<StagedEvent>> {
        let rows = sqlx::query_as::<_, StagedEvent>(
            "SELECT * FROM staged_events WHERE status = 'clean' ORDER BY fingerprint",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All quarantined rows, for the audit re-check.
    pub async fn quarantined_events(&self) -> Result<Vec<StagedEvent>> {
        let rows = sqlx::query_as::<_, StagedEvent>(
            "SELECT * FROM staged_events WHERE status = 'quarantined' ORDER BY fingerprint",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Auditor-only: move a row into quarantine, recording the violated kinds.
    pub async fn quarantine(&self, fingerprint: &str, reasons: &[String]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE staged_events
            SET status = 'quarantined', quarantine_reasons = $2
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint)
        .bind(reasons)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Auditor-only: return a quarantined row to the clean set.
    pub async fn requalify(&self, fingerprint: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE staged_events
            SET status = 'clean', quarantine_reasons = '{}'
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clean rows not yet published, or published from different content.
    /// Ordered by fingerprint so batches are deterministic and resumable.
    pub async fn publish_backlog(&self, batch_size: i64) -> Result<Vec<StagedEvent>> {
        let rows = sqlx::query_as::<_, StagedEvent>(
            r#"
            SELECT s.*
            FROM staged_events s
            LEFT JOIN published_events p ON p.fingerprint = s.fingerprint
            WHERE s.status = 'clean'
              AND (p.fingerprint IS NULL OR p.content_hash <> s.content_hash)
            ORDER BY s.fingerprint
            LIMIT $1
            "#,
        )
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn genres_for(&self, fingerprint: &str) -> Result<Vec<GenreLink>> {
        let rows = sqlx::query_as::<_, GenreLink>(
            "SELECT * FROM event_genres WHERE fingerprint = $1 ORDER BY position",
        )
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn artists_for(&self, fingerprint: &str) -> Result<Vec<ArtistLink>> {
        let rows = sqlx::query_as::<_, ArtistLink>(
            "SELECT * FROM event_artists WHERE fingerprint = $1 ORDER BY position",
        )
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM staged_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn count_by_status(&self, status: EventStatus) -> Result<i64> {
        let row = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM staged_events WHERE status = $1",
        )
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
