// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device position source.
//!
//! The platform shell implements [`LocationProvider`] over the OS location
//! APIs; the tracker only needs a permission check, a one-shot fix and a
//! fixed-interval subscription.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// A position fix from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub lat: f64,
    pub lng: f64,
    /// Device clock, epoch milliseconds
    pub timestamp_ms: i64,
}

/// Errors from the location provider.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission not granted")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Ask for (or confirm) foreground location permission.
    async fn request_permission(&self) -> Result<bool, LocationError>;

    /// One immediate high-accuracy fix.
    async fn current_position(&self) -> Result<PositionFix, LocationError>;

    /// Continuous updates at a fixed interval (not distance gated).
    ///
    /// Dropping the receiver ends the subscription.
    async fn watch_position(
        &self,
        interval: Duration,
    ) -> Result<mpsc::Receiver<PositionFix>, LocationError>;
}
