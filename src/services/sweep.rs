// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Overdue hike sweep.
//!
//! One pass:
//! 1. Select active, unalerted hikes whose deadline is older than `now - grace`
//! 2. For each hike independently: skip if no location, otherwise email the
//!    emergency contact
//! 3. After a delivered email, flip the alert latch with a conditional write
//!
//! A failure on one hike is recorded in its outcome and never aborts the pass.
//! Only the initial query can fail the whole sweep.

use crate::config::MAX_GRACE_MINUTES;
use crate::db::HikeStore;
use crate::error::AppError;
use crate::models::Hike;
use crate::services::alert::compose_overdue_alert;
use crate::services::notification::NotificationSender;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Per-hike result of a sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SweepOutcome {
    /// Email delivered and hike marked overdue.
    Emailed,
    /// No last known location; left untouched for a later pass.
    SkippedMissingLocation,
    /// Delivery failed; hike stays eligible for the next pass.
    EmailFailed,
    /// Email delivered but the latch write failed; a later pass may re-send.
    UpdateFailed,
    /// Email delivered but another writer resolved the hike first.
    AlreadyResolved,
}

impl SweepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepOutcome::Emailed => "emailed",
            SweepOutcome::SkippedMissingLocation => "skipped_missing_location",
            SweepOutcome::EmailFailed => "email_failed",
            SweepOutcome::UpdateFailed => "update_failed",
            SweepOutcome::AlreadyResolved => "already_resolved",
        }
    }
}

/// Outcome for a single hike, as reported by the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HikeSweepResult {
    pub id: String,
    pub status: SweepOutcome,
}

/// Summary of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SweepSummary {
    pub processed: usize,
    pub results: Vec<HikeSweepResult>,
}

impl SweepSummary {
    /// Number of hikes with the given outcome.
    pub fn count(&self, outcome: SweepOutcome) -> usize {
        self.results.iter().filter(|r| r.status == outcome).count()
    }

    /// Outcome recorded for a hike, if it was selected.
    pub fn outcome_for(&self, hike_id: &str) -> Option<SweepOutcome> {
        self.results
            .iter()
            .find(|r| r.id == hike_id)
            .map(|r| r.status)
    }
}

/// Runs sweep passes against a store and a notification sender.
#[derive(Clone)]
pub struct OverdueSweep {
    store: Arc<dyn HikeStore>,
    sender: Arc<dyn NotificationSender>,
    grace: Duration,
}

impl OverdueSweep {
    /// `grace_minutes` is clamped to `0..=MAX_GRACE_MINUTES`.
    pub fn new(
        store: Arc<dyn HikeStore>,
        sender: Arc<dyn NotificationSender>,
        grace_minutes: i64,
    ) -> Self {
        Self {
            store,
            sender,
            grace: Duration::minutes(grace_minutes.clamp(0, MAX_GRACE_MINUTES)),
        }
    }

    /// Run one pass as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepSummary, AppError> {
        let threshold = now
            .checked_sub_signed(self.grace)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let hikes = self.store.find_overdue_candidates(threshold).await?;
        tracing::info!(
            candidates = hikes.len(),
            threshold = %threshold,
            "Overdue sweep started"
        );

        let mut summary = SweepSummary::default();
        for hike in &hikes {
            let status = self.process_hike(hike).await;
            summary.results.push(HikeSweepResult {
                id: hike.id.clone(),
                status,
            });
        }
        summary.processed = summary.results.len();

        tracing::info!(
            processed = summary.processed,
            emailed = summary.count(SweepOutcome::Emailed),
            skipped = summary.count(SweepOutcome::SkippedMissingLocation),
            email_failed = summary.count(SweepOutcome::EmailFailed),
            update_failed = summary.count(SweepOutcome::UpdateFailed),
            "Overdue sweep finished"
        );

        Ok(summary)
    }

    async fn process_hike(&self, hike: &Hike) -> SweepOutcome {
        let Some(alert) = compose_overdue_alert(hike) else {
            tracing::warn!(
                hike_id = %hike.id,
                "Overdue hike has no last known location, not alerting yet"
            );
            return SweepOutcome::SkippedMissingLocation;
        };

        if let Err(e) = self.sender.send(&alert).await {
            tracing::error!(
                hike_id = %hike.id,
                error = %e,
                "Failed to send overdue alert, will retry on next sweep"
            );
            return SweepOutcome::EmailFailed;
        }

        match self.store.mark_alerted(&hike.id).await {
            Ok(true) => {
                tracing::info!(hike_id = %hike.id, trail_id = %hike.trail_id, "Overdue alert sent");
                SweepOutcome::Emailed
            }
            Ok(false) => {
                tracing::warn!(
                    hike_id = %hike.id,
                    "Alert sent but hike was already resolved by another writer"
                );
                SweepOutcome::AlreadyResolved
            }
            Err(e) => {
                tracing::error!(
                    hike_id = %hike.id,
                    error = %e,
                    "Alert sent but failed to mark hike alerted; may re-send"
                );
                SweepOutcome::UpdateFailed
            }
        }
    }
}
