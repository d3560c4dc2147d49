//! Background scheduler with an owned lifecycle.
//!
//! Each job runs in its own task as a sequential loop — sleep until due, run
//! to completion, sleep again — so two runs of the same job can never
//! overlap. A failed run is logged and retried at the next tick; intake
//! retains the replay source either way.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use gigwire_common::{Config, SourceType};
use gigwire_pipeline::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub schedule: String,
}

pub struct PipelineScheduler {
    pipeline: Pipeline,
    config: Config,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl PipelineScheduler {
    pub fn new(pipeline: Pipeline, config: Config) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            pipeline,
            config,
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn jobs(&self) -> Vec<JobDescriptor> {
        vec![
            JobDescriptor {
                id: "daily_ingest",
                name: "Daily Mock Scraper Ingest",
                schedule: format!("daily at {:02}:00 UTC", self.config.ingest_hour_utc),
            },
            JobDescriptor {
                id: "auto_publish",
                name: "Auto-Publish Workflow",
                schedule: format!("every {} minutes", self.config.publish_interval_minutes),
            },
        ]
    }

    /// Spawn the job loops. Idempotent start is not supported — call once.
    pub fn start(&mut self) {
        let ingest_hour = self.config.ingest_hour_utc;
        let pipeline = self.pipeline.clone();
        let mut shutdown = self.shutdown_rx.clone();
        self.handles.push(tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let due = next_daily_run(now, ingest_hour);
                let wait = (due - now).to_std().unwrap_or(StdDuration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.changed() => break,
                }
                if let Err(e) = run_ingest(&pipeline).await {
                    warn!(error = %e, "Scheduled ingest run failed, will retry next tick");
                }
            }
        }));

        let interval = StdDuration::from_secs(self.config.publish_interval_minutes * 60);
        let batch_size = self.config.publish_batch_size;
        let pipeline = self.pipeline.clone();
        let mut shutdown = self.shutdown_rx.clone();
        self.handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => break,
                }
                if let Err(e) = run_auto_publish(&pipeline, batch_size).await {
                    warn!(error = %e, "Scheduled publish run failed, will retry next tick");
                }
            }
        }));

        info!(
            ingest_hour_utc = ingest_hour,
            publish_interval_minutes = self.config.publish_interval_minutes,
            "Scheduler started"
        );
    }

    /// Stop the job loops and wait for in-flight runs to finish.
    pub async fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }
}

/// Next occurrence of `hour:00:00` UTC strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today_run = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("scheduler hour must be 0-23")
        .and_utc();
    if today_run > now {
        today_run
    } else {
        today_run + Duration::days(1)
    }
}

async fn run_ingest(pipeline: &Pipeline) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "Scheduled ingest run started");

    let events = gigwire_scraper::generate_events(10);
    let payload = serde_json::to_value(&events)?;

    let batch_id = pipeline
        .intake
        .append(
            gigwire_scraper::SOURCE_NAME,
            payload,
            Some(gigwire_scraper::SOURCE_VERSION),
        )
        .await?;
    let outcome = pipeline.transformer.promote(batch_id, SourceType::Scraper).await?;

    info!(
        %run_id,
        batch_id,
        processed = outcome.records_processed,
        created = outcome.records_created,
        "Scheduled ingest run complete"
    );
    Ok(())
}

async fn run_auto_publish(pipeline: &Pipeline, batch_size: i64) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "Scheduled publish run started");

    let outcome = pipeline.publisher.auto_publish(batch_size, Utc::now()).await?;

    info!(
        %run_id,
        status = ?outcome.status,
        published = outcome.published_count,
        "Scheduled publish run complete"
    );
    Ok(())
}
