//! Staging transformer — promotes raw intake batches into the staging tier.
//!
//! Fingerprint-keyed upserts make the promotion idempotent: replaying a batch
//! (scrapers deliver at-least-once) updates rows in place instead of
//! duplicating them.

use anyhow::anyhow;
use tracing::{debug, warn};

use gigwire_common::{RawEventRecord, SourceType};

use crate::error::Result;
use crate::intake::IntakeStore;
use crate::staging::StagingStore;
use crate::types::PromoteOutcome;

#[derive(Clone)]
pub struct StagingTransformer {
    intake: IntakeStore,
    staging: StagingStore,
}

impl StagingTransformer {
    pub fn new(intake: IntakeStore, staging: StagingStore) -> Self {
        Self { intake, staging }
    }

    /// Promote every record in an intake batch into staging.
    ///
    /// A document that fails to deserialize (missing identity field, wrong
    /// shape) is skipped and counted — the rest of the batch proceeds. An
    /// unknown batch id fails the whole call.
    pub async fn promote(&self, batch_id: i64, source_type: SourceType) -> Result<PromoteOutcome> {
        let batch = self.intake.read(batch_id).await?;

        let docs = batch
            .payload
            .as_array()
            .cloned()
            .ok_or_else(|| anyhow!("Intake batch {batch_id} payload is not an array"))?;

        let mut outcome = PromoteOutcome::default();

        for doc in docs {
            let record: RawEventRecord = match serde_json::from_value(doc) {
                Ok(record) => record,
                Err(e) => {
                    warn!(batch_id, error = %e, "Skipping malformed record");
                    outcome.records_failed += 1;
                    continue;
                }
            };

            let fingerprint = record.fingerprint();
            let content_hash = record.content_hash();

            let is_new = self
                .staging
                .upsert_event(&fingerprint, &record, source_type, batch_id, &content_hash)
                .await?;

            self.staging
                .replace_associations(&fingerprint, &record.genre_ids, &record.artist_ids)
                .await?;

            outcome.records_processed += 1;
            if is_new {
                outcome.records_created += 1;
            }

            debug!(
                fingerprint = %fingerprint,
                created = is_new,
                name = record.event_name.as_deref().unwrap_or("<unnamed>"),
                "Staged event upserted"
            );
        }

        debug!(
            batch_id,
            processed = outcome.records_processed,
            created = outcome.records_created,
            failed = outcome.records_failed,
            "Intake batch promoted to staging"
        );

        Ok(outcome)
    }
}
