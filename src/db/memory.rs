// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory Hike Store for local development and tests.
//!
//! Each conditional write runs while holding the entry's shard lock, so the
//! check and the update cannot interleave with another writer on the same hike.

use crate::db::{EndTransition, HikeStore, LocationUpdate};
use crate::error::AppError;
use crate::models::{BreadcrumbRecord, Hazard, Hike, HikeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory hike and breadcrumb collections.
#[derive(Clone, Default)]
pub struct MemoryDb {
    hikes: Arc<DashMap<String, Hike>>,
    breadcrumbs: Arc<DashMap<String, Vec<BreadcrumbRecord>>>,
    /// Keyed by trail
    hazards: Arc<DashMap<String, Vec<Hazard>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored hikes.
    pub fn hike_count(&self) -> usize {
        self.hikes.len()
    }
}

#[async_trait]
impl HikeStore for MemoryDb {
    async fn create_hike(&self, hike: &Hike) -> Result<(), AppError> {
        self.hikes.insert(hike.id.clone(), hike.clone());
        Ok(())
    }

    async fn get_hike(&self, hike_id: &str) -> Result<Option<Hike>, AppError> {
        Ok(self.hikes.get(hike_id).map(|h| h.value().clone()))
    }

    async fn record_location(
        &self,
        hike_id: &str,
        lat: f64,
        lng: f64,
        at: DateTime<Utc>,
    ) -> Result<LocationUpdate, AppError> {
        let Some(mut hike) = self.hikes.get_mut(hike_id) else {
            return Ok(LocationUpdate::NotFound);
        };

        if hike.apply_location(lat, lng, at) {
            Ok(LocationUpdate::Applied)
        } else {
            Ok(LocationUpdate::Stale)
        }
    }

    async fn append_breadcrumb(&self, record: &BreadcrumbRecord) -> Result<(), AppError> {
        self.breadcrumbs
            .entry(record.hike_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_breadcrumbs(&self, hike_id: &str) -> Result<Vec<BreadcrumbRecord>, AppError> {
        let mut records = self
            .breadcrumbs
            .get(hike_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }

    async fn complete_hike(
        &self,
        hike_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<EndTransition, AppError> {
        let Some(mut hike) = self.hikes.get_mut(hike_id) else {
            return Ok(EndTransition::NotFound);
        };

        let transition = match hike.status {
            HikeStatus::Active => {
                hike.status = HikeStatus::Completed;
                EndTransition::Completed
            }
            HikeStatus::Completed => EndTransition::AlreadyCompleted,
            HikeStatus::Overdue => EndTransition::AlreadyOverdue,
        };
        if hike.ended_at.is_none() {
            hike.ended_at = Some(ended_at);
        }
        Ok(transition)
    }

    async fn find_overdue_candidates(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Hike>, AppError> {
        let mut hikes: Vec<Hike> = self
            .hikes
            .iter()
            .filter(|h| h.is_alert_eligible() && h.expected_return_at < threshold)
            .map(|h| h.value().clone())
            .collect();
        hikes.sort_by_key(|h| h.expected_return_at);
        Ok(hikes)
    }

    async fn mark_alerted(&self, hike_id: &str) -> Result<bool, AppError> {
        let Some(mut hike) = self.hikes.get_mut(hike_id) else {
            return Ok(false);
        };

        if !hike.is_alert_eligible() {
            return Ok(false);
        }
        hike.alert_sent = true;
        hike.status = HikeStatus::Overdue;
        Ok(true)
    }

    async fn report_hazard(&self, hazard: &Hazard) -> Result<(), AppError> {
        self.hazards
            .entry(hazard.trail_id.clone())
            .or_default()
            .push(hazard.clone());
        Ok(())
    }

    async fn count_hazards_since(
        &self,
        trail_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        Ok(self
            .hazards
            .get(trail_id)
            .map(|h| h.iter().filter(|r| r.created_at >= since).count())
            .unwrap_or(0))
    }
}
