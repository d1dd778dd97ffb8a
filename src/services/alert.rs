// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Overdue alert composition.

use crate::models::Hike;
use crate::services::notification::Notification;
use crate::time_utils::format_utc_rfc3339;

pub const OVERDUE_SUBJECT: &str = "TrailSafe alert: hiker overdue";

/// Map link for a coordinate pair.
pub fn map_link(lat: f64, lng: f64) -> String {
    format!("https://maps.google.com/?q={},{}", lat, lng)
}

/// Build the overdue email for a hike with a known last position.
///
/// Returns `None` when the hike has no last location; such hikes are never
/// alerted.
pub fn compose_overdue_alert(hike: &Hike) -> Option<Notification> {
    let (lat, lng) = hike.last_position()?;

    let last_seen = hike
        .last_location_at
        .map(format_utc_rfc3339)
        .unwrap_or_else(|| "Unknown".to_string());

    let body = [
        "TrailSafe Alert:".to_string(),
        String::new(),
        "Your friend has not checked back by their expected return time.".to_string(),
        format!("Trail ID: {}", hike.trail_id),
        format!("Last known coordinates: {}, {}", lat, lng),
        format!("Last location time: {}", last_seen),
        format!("Map: {}", map_link(lat, lng)),
    ]
    .join("\n");

    Some(Notification {
        to: hike.emergency_contact.clone(),
        subject: OVERDUE_SUBJECT.to_string(),
        body,
    })
}
