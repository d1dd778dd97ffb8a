// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-slot check-in store.

use super::storage::{keys, LocalStorage, StorageError};
use crate::models::CheckInData;
use std::sync::RwLock;

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Derived view of the active check-in at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInStatus {
    pub data: Option<CheckInData>,
    pub is_active: bool,
    pub is_overdue: bool,
    /// Negative once overdue
    pub remaining_ms: i64,
    pub remaining_formatted: String,
}

impl CheckInStatus {
    pub fn at(data: Option<&CheckInData>, now_ms: i64) -> Self {
        let Some(data) = data else {
            return Self {
                data: None,
                is_active: false,
                is_overdue: false,
                remaining_ms: 0,
                remaining_formatted: String::new(),
            };
        };

        let remaining_ms = data.expected_return_time - now_ms;
        let is_overdue = remaining_ms <= 0;
        let suffix = if is_overdue { "overdue" } else { "remaining" };

        Self {
            data: Some(data.clone()),
            is_active: true,
            is_overdue,
            remaining_ms,
            remaining_formatted: format_duration(remaining_ms.abs(), suffix),
        }
    }
}

fn format_duration(ms: i64, suffix: &str) -> String {
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    if hours > 0 {
        format!("{}h {}m {}", hours, minutes, suffix)
    } else {
        format!("{}m {}", minutes, suffix)
    }
}

/// Holds at most one check-in, persisted under the check-in key.
pub struct CheckInStore {
    storage: LocalStorage,
    slot: RwLock<Option<CheckInData>>,
}

impl CheckInStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            slot: RwLock::new(None),
        }
    }

    /// Read the persisted check-in into the slot.
    ///
    /// An unreadable value is logged and treated as no check-in.
    pub async fn load(&self) -> Option<CheckInData> {
        let loaded = match self.storage.get_item::<CheckInData>(keys::CHECK_IN).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load check-in");
                None
            }
        };
        self.set_slot(loaded.clone());
        loaded
    }

    /// Replace any existing check-in.
    pub async fn save(&self, data: CheckInData) -> Result<(), StorageError> {
        self.storage.set_item(keys::CHECK_IN, &data).await?;
        tracing::info!(
            trail_id = %data.trail_id,
            expected_return_time = data.expected_return_time,
            "Check-in saved"
        );
        self.set_slot(Some(data));
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(keys::CHECK_IN).await?;
        self.set_slot(None);
        Ok(())
    }

    /// The check-in currently held in memory.
    pub fn current(&self) -> Option<CheckInData> {
        match self.slot.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn status(&self, now_ms: i64) -> CheckInStatus {
        CheckInStatus::at(self.current().as_ref(), now_ms)
    }

    fn set_slot(&self, value: Option<CheckInData>) {
        match self.slot.write() {
            Ok(mut slot) => *slot = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}
