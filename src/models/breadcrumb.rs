// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Breadcrumb points (device side) and breadcrumb audit records (server side).

use crate::time_utils::rfc3339_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single position sample recorded on the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreadcrumbPoint {
    pub lat: f64,
    pub lng: f64,
    /// Device clock, epoch milliseconds
    pub ts: i64,
}

impl BreadcrumbPoint {
    pub fn new(lat: f64, lng: f64, ts: i64) -> Self {
        Self { lat, lng, ts }
    }

    /// Exact coordinate equality (timestamps ignored).
    pub fn same_position(&self, other: &BreadcrumbPoint) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

/// Append-only audit copy of an uploaded breadcrumb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadcrumbRecord {
    pub hike_id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(with = "rfc3339_millis")]
    pub recorded_at: DateTime<Utc>,
}

impl BreadcrumbRecord {
    /// Document ID: one record per hike and sample time.
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}",
            urlencoding::encode(&self.hike_id),
            self.recorded_at.timestamp_millis()
        )
    }
}
