//! Quality auditor — the gate between staging and publish.
//!
//! Scans the clean working set for policy violations and quarantines the
//! violators. Never deletes, never publishes. Quarantine is a hold state:
//! rows stay inspectable and return to the clean set once a later audit
//! finds the violation resolved.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::staging::StagingStore;
use crate::types::StagedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Event date strictly before the audit date.
    PastDate,
    /// Event date beyond the configured future horizon.
    HorizonExceeded,
    /// End time earlier than start time (same-day assumption).
    EndBeforeStart,
    /// Free flag and price bounds contradict each other.
    PriceConflict,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::PastDate => "past_date",
            ViolationKind::HorizonExceeded => "horizon_exceeded",
            ViolationKind::EndBeforeStart => "end_before_start",
            ViolationKind::PriceConflict => "price_conflict",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable audit thresholds.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    /// Maximum days into the future an event date may be.
    pub horizon_days: i64,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self { horizon_days: 180 }
    }
}

/// Result of one audit run. Ephemeral — the quarantine flags are what persist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditFinding {
    /// Total rule violations found among clean rows.
    pub error_count: u64,
    /// Rows newly moved into quarantine this run.
    pub quarantined_count: u64,
    /// Previously quarantined rows that now pass and were returned to clean.
    pub requalified_count: u64,
    /// Violation counts grouped by kind.
    pub summary: BTreeMap<String, u64>,
}

impl AuditFinding {
    pub fn passed(&self) -> bool {
        self.error_count == 0
    }

    /// Human-readable one-liner, e.g. `"past_date=2, price_conflict=1"`.
    pub fn summary_line(&self) -> String {
        self.summary
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Evaluate every rule against one staged event. Pure — `today` is passed in
/// so temporal rules are testable.
pub fn violations(event: &StagedEvent, today: NaiveDate, policy: &AuditPolicy) -> Vec<ViolationKind> {
    let mut found = Vec::new();

    if event.event_date < today {
        found.push(ViolationKind::PastDate);
    }

    if event.event_date > today + Duration::days(policy.horizon_days) {
        found.push(ViolationKind::HorizonExceeded);
    }

    if let Some(end) = event.end_time {
        if end < event.start_time {
            found.push(ViolationKind::EndBeforeStart);
        }
    }

    let has_price = |p: Option<i64>| p.is_some_and(|cents| cents > 0);
    if event.is_free {
        if has_price(event.price_min_cents) || has_price(event.price_max_cents) {
            found.push(ViolationKind::PriceConflict);
        }
    } else if event.price_min_cents.is_none() {
        found.push(ViolationKind::PriceConflict);
    }

    found
}

#[derive(Clone)]
pub struct Auditor {
    staging: StagingStore,
    policy: AuditPolicy,
}

impl Auditor {
    pub fn new(staging: StagingStore, policy: AuditPolicy) -> Self {
        Self { staging, policy }
    }

    /// Run one audit pass at the given instant.
    ///
    /// Idempotent: violators leave the clean set when flagged, so a second
    /// pass with no intervening staging changes finds zero violations.
    /// Each status flip is its own statement — a crash mid-run leaves some
    /// rows audited and the rest untouched for the next pass.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<AuditFinding> {
        let today = now.date_naive();
        let mut finding = AuditFinding::default();

        for event in self.staging.clean_events().await? {
            let found = violations(&event, today, &self.policy);
            if found.is_empty() {
                continue;
            }

            let reasons: Vec<String> = found.iter().map(|k| k.as_str().to_string()).collect();
            self.staging.quarantine(&event.fingerprint, &reasons).await?;

            finding.error_count += found.len() as u64;
            finding.quarantined_count += 1;
            for kind in &found {
                *finding.summary.entry(kind.as_str().to_string()).or_default() += 1;
            }

            warn!(
                fingerprint = %event.fingerprint,
                reasons = %reasons.join(","),
                "Staged event quarantined"
            );
        }

        // Re-check the quarantine: corrected re-upserts earn their way back
        // to clean here, never via ingestion.
        for event in self.staging.quarantined_events().await? {
            if violations(&event, today, &self.policy).is_empty() {
                self.staging.requalify(&event.fingerprint).await?;
                finding.requalified_count += 1;
                info!(fingerprint = %event.fingerprint, "Quarantined event requalified");
            }
        }

        if finding.error_count > 0 {
            warn!(
                errors = finding.error_count,
                quarantined = finding.quarantined_count,
                summary = %finding.summary_line(),
                "Audit found violations"
            );
        } else {
            info!(requalified = finding.requalified_count, "Audit passed");
        }

        Ok(finding)
    }
}
