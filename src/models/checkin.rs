// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in (expected return + emergency contact) held on the device.

use serde::{Deserialize, Serialize};

/// The single active check-in on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInData {
    pub contact_name: String,
    /// Phone number or email address
    pub contact_info: String,
    /// Epoch milliseconds
    pub expected_return_time: i64,
    pub trail_id: String,
    /// Epoch milliseconds
    pub start_time: i64,
}

impl CheckInData {
    /// Build a check-in, rejecting a deadline that is not after the start.
    pub fn new(
        contact_name: impl Into<String>,
        contact_info: impl Into<String>,
        trail_id: impl Into<String>,
        start_time: i64,
        expected_return_time: i64,
    ) -> Result<Self, InvalidCheckIn> {
        if expected_return_time <= start_time {
            return Err(InvalidCheckIn::DeadlineNotAfterStart);
        }
        Ok(Self {
            contact_name: contact_name.into(),
            contact_info: contact_info.into(),
            expected_return_time,
            trail_id: trail_id.into(),
            start_time,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidCheckIn {
    #[error("Expected return time must be after the start time")]
    DeadlineNotAfterStart,
}
