//! Write-Audit-Publish pipeline for raw event records.
//!
//! Three tiers, one fingerprint key: raw batches land append-only in intake,
//! the transformer upserts them into a deduplicated staging set, the auditor
//! quarantines policy violators, and the publish workflow promotes only the
//! audited backlog.

pub mod audit;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod publish;
pub mod staging;
pub mod transformer;
pub mod types;

pub use audit::{AuditFinding, AuditPolicy, Auditor, ViolationKind};
pub use error::{PipelineError, Result};
pub use intake::IntakeStore;
pub use metrics::PipelineMetrics;
pub use publish::{PublishOutcome, PublishStatus, PublishWorkflow, PublishedStore};
pub use staging::StagingStore;
pub use transformer::StagingTransformer;
pub use types::{PromoteOutcome, PublishedEvent, RawBatch, StagedEvent};

use sqlx::PgPool;

/// Run the embedded SQL migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| PipelineError::Database(e.into()))?;
    Ok(())
}

/// All pipeline components wired over one pool. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    pub intake: IntakeStore,
    pub staging: StagingStore,
    pub published: PublishedStore,
    pub transformer: StagingTransformer,
    pub auditor: Auditor,
    pub publisher: PublishWorkflow,
}

impl Pipeline {
    pub fn new(pool: PgPool, policy: AuditPolicy) -> Self {
        let intake = IntakeStore::new(pool.clone());
        let staging = StagingStore::new(pool.clone());
        let published = PublishedStore::new(pool);
        let transformer = StagingTransformer::new(intake.clone(), staging.clone());
        let auditor = Auditor::new(staging.clone(), policy);
        let publisher = PublishWorkflow::new(auditor.clone(), staging.clone(), published.clone());

        Self {
            intake,
            staging,
            published,
            transformer,
            auditor,
            publisher,
        }
    }

    pub async fn metrics(&self) -> Result<PipelineMetrics> {
        PipelineMetrics::gather(&self.intake, &self.staging, &self.published).await
    }
}
