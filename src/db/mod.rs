// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hike Store: the durable record of hikes shared by the hike API and the
//! overdue sweep.
//!
//! Two backends implement [`HikeStore`]: Firestore for deployments and an
//! in-memory map for local development and tests. In both, the two status
//! transitions (`complete_hike`, `mark_alerted`) are single atomic conditional
//! writes on the expected prior state.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{BreadcrumbRecord, Hazard, Hike, HikeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const HIKES: &str = "hikes";
    /// Append-only breadcrumb audit log (keyed by hike_id + sample time)
    pub const BREADCRUMBS: &str = "breadcrumbs";
    pub const HAZARDS: &str = "hazards";
}

/// Result of a location update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationUpdate {
    /// The hike's last known location now reflects the sample.
    Applied,
    /// The sample was not newer than the stored one and was ignored.
    Stale,
    NotFound,
}

/// Result of an attempt to end a hike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTransition {
    /// `active -> completed`
    Completed,
    AlreadyCompleted,
    /// The sweep flagged the hike first; status stays `overdue`.
    AlreadyOverdue,
    NotFound,
}

impl EndTransition {
    /// Status of the record after the call (None if it does not exist).
    pub fn resulting_status(&self) -> Option<HikeStatus> {
        match self {
            EndTransition::Completed | EndTransition::AlreadyCompleted => {
                Some(HikeStatus::Completed)
            }
            EndTransition::AlreadyOverdue => Some(HikeStatus::Overdue),
            EndTransition::NotFound => None,
        }
    }
}

/// Typed operations on the Hike Store.
#[async_trait]
pub trait HikeStore: Send + Sync {
    /// Insert a newly started hike.
    async fn create_hike(&self, hike: &Hike) -> Result<(), AppError>;

    async fn get_hike(&self, hike_id: &str) -> Result<Option<Hike>, AppError>;

    /// Update the last known location, only if `at` is newer than the stored one.
    async fn record_location(
        &self,
        hike_id: &str,
        lat: f64,
        lng: f64,
        at: DateTime<Utc>,
    ) -> Result<LocationUpdate, AppError>;

    async fn append_breadcrumb(&self, record: &BreadcrumbRecord) -> Result<(), AppError>;

    /// Breadcrumbs of a hike, oldest first.
    async fn list_breadcrumbs(&self, hike_id: &str) -> Result<Vec<BreadcrumbRecord>, AppError>;

    /// Conditionally move `active -> completed`, stamping `ended_at`.
    ///
    /// An `overdue` hike keeps its status; only `ended_at` is recorded if unset.
    async fn complete_hike(
        &self,
        hike_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<EndTransition, AppError>;

    /// Hikes with `status = active AND alert_sent = false AND
    /// expected_return_at < threshold`.
    async fn find_overdue_candidates(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Hike>, AppError>;

    /// Atomically set `alert_sent = true, status = overdue` if the hike is
    /// still `active` and not yet alerted.
    ///
    /// Returns `false` if the row no longer matched (another sweep won the
    /// race, or the hiker completed the hike).
    async fn mark_alerted(&self, hike_id: &str) -> Result<bool, AppError>;

    async fn report_hazard(&self, hazard: &Hazard) -> Result<(), AppError>;

    /// Number of hazards reported for a trail at or after `since`.
    async fn count_hazards_since(
        &self,
        trail_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, AppError>;
}
