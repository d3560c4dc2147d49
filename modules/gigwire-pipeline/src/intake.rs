//! IntakeStore — append-only log of raw ingestion batches backed by Postgres.
//!
//! This is the audit trail of record: a batch, once written, is never edited
//! or removed. Every downstream tier can be rebuilt by replaying it.

use sqlx::PgPool;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::types::RawBatch;

/// Append-only intake store. The single source of truth for "what was received".
#[derive(Clone)]
pub struct IntakeStore {
    pool: PgPool,
}

impl IntakeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a batch of raw records as received. A single INSERT, so
    /// concurrent appends from independent sources cannot interleave.
    /// Returns the assigned batch id.
    pub async fn append(
        &self,
        source: &str,
        payload: serde_json::Value,
        source_version: Option<&str>,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO intake_batches (source, payload, source_version)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(source)
        .bind(&payload)
        .bind(source_version)
        .fetch_one(&self.pool)
        .await?;

        let records = payload.as_array().map(|a| a.len()).unwrap_or(0);
        info!(batch_id = id, source, records, "Raw batch written to intake");

        Ok(id)
    }

    /// Read a batch by id. Fails hard with `BatchNotFound` if it does not exist.
    pub async fn read(&self, batch_id: i64) -> Result<RawBatch> {
        let row = sqlx::query_as::<_, RawBatch>(
            r#"
            SELECT id, source, received_at, payload, source_version
            FROM intake_batches
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(PipelineError::BatchNotFound(batch_id))
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM intake_batches")
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }
}
