// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trail hazard reports submitted by hikers.

use crate::time_utils::rfc3339_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window used when counting recent reports for a trail.
pub const RECENT_HAZARD_WINDOW_HOURS: i64 = 48;

/// Stored hazard report (document ID = `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: String,
    pub trail_id: String,
    /// Reporter (JWT subject)
    pub user_id: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

impl Hazard {
    pub fn report(
        user_id: impl Into<String>,
        trail_id: impl Into<String>,
        position: Option<(f64, f64)>,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            trail_id: trail_id.into(),
            user_id: user_id.into(),
            lat: position.map(|(lat, _)| lat),
            lng: position.map(|(_, lng)| lng),
            note: note.filter(|n| !n.trim().is_empty()),
            created_at,
        }
    }
}
