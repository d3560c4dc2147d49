use serde::Serialize;

use gigwire_common::EventStatus;

use crate::error::Result;
use crate::intake::IntakeStore;
use crate::publish::PublishedStore;
use crate::staging::StagingStore;

/// Record counts across the three tiers.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineMetrics {
    pub intake_batches: i64,
    pub staged_total: i64,
    pub staged_clean: i64,
    pub staged_quarantined: i64,
    pub published: i64,
}

impl PipelineMetrics {
    pub async fn gather(
        intake: &IntakeStore,
        staging: &StagingStore,
        published: &PublishedStore,
    ) -> Result<Self> {
        Ok(Self {
            intake_batches: intake.count().await?,
            staged_total: staging.count().await?,
            staged_clean: staging.count_by_status(EventStatus::Clean).await?,
            staged_quarantined: staging.count_by_status(EventStatus::Quarantined).await?,
            published: published.count().await?,
        })
    }
}
