// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hike record model for storage and API.

use crate::time_utils::{rfc3339_millis, rfc3339_millis_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Lifecycle state of a hike.
///
/// `active` moves to exactly one of the two terminal states. There is no
/// transition out of `overdue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum HikeStatus {
    Active,
    Completed,
    Overdue,
}

impl HikeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HikeStatus::Active => "active",
            HikeStatus::Completed => "completed",
            HikeStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for HikeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored hike record (document ID = `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hike {
    /// Opaque hike ID (UUID v4)
    pub id: String,
    /// Owner (JWT subject)
    pub user_id: String,
    pub trail_id: String,
    /// Email address (or phone) of the emergency contact
    pub emergency_contact: String,
    /// Deadline after which the hike is considered overdue (plus grace)
    #[serde(with = "rfc3339_millis")]
    pub expected_return_at: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "rfc3339_millis_option")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_lat: Option<f64>,
    #[serde(default)]
    pub last_lng: Option<f64>,
    #[serde(default, with = "rfc3339_millis_option")]
    pub last_location_at: Option<DateTime<Utc>>,
    pub status: HikeStatus,
    /// One-way latch: set once an overdue alert was delivered
    #[serde(default)]
    pub alert_sent: bool,
}

impl Hike {
    /// Create a freshly started hike (`active`, not alerted, no location yet).
    pub fn start(
        user_id: impl Into<String>,
        trail_id: impl Into<String>,
        emergency_contact: impl Into<String>,
        expected_return_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            trail_id: trail_id.into(),
            emergency_contact: emergency_contact.into(),
            expected_return_at,
            started_at,
            ended_at: None,
            last_lat: None,
            last_lng: None,
            last_location_at: None,
            status: HikeStatus::Active,
            alert_sent: false,
        }
    }

    /// Last known position, if both coordinates have been recorded.
    pub fn last_position(&self) -> Option<(f64, f64)> {
        match (self.last_lat, self.last_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Whether the sweep may still alert for this hike.
    pub fn is_alert_eligible(&self) -> bool {
        self.status == HikeStatus::Active && !self.alert_sent
    }

    /// Apply a location sample if it is newer than the current one.
    ///
    /// Returns `false` for stale (out-of-order) samples, which are ignored.
    pub fn apply_location(&mut self, lat: f64, lng: f64, at: DateTime<Utc>) -> bool {
        if self.last_location_at.is_some_and(|current| at <= current) {
            return false;
        }
        self.last_lat = Some(lat);
        self.last_lng = Some(lng);
        self.last_location_at = Some(at);
        true
    }
}
