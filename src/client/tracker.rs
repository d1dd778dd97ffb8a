// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Breadcrumb tracker.
//!
//! Samples the device position at a fixed interval while tracking is on and
//! keeps an ordered, persisted log of points. The log survives restarts and
//! is only emptied by an explicit [`BreadcrumbTracker::clear`].
//!
//! Every append (seed or subscription) runs inside the log lock and persists
//! the full list before the in-memory copy changes, so concurrent appends
//! never overwrite each other's persisted state.

use super::location::{LocationError, LocationProvider, PositionFix};
use super::storage::{keys, LocalStorage};
use crate::models::BreadcrumbPoint;
use crate::services::track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

/// Default sampling interval.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Running position subscription.
struct Subscription {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct BreadcrumbTracker {
    location: Arc<dyn LocationProvider>,
    storage: LocalStorage,
    sample_interval: Duration,
    log: Arc<Mutex<Vec<BreadcrumbPoint>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl BreadcrumbTracker {
    pub fn new(location: Arc<dyn LocationProvider>, storage: LocalStorage) -> Self {
        Self::with_interval(location, storage, DEFAULT_SAMPLE_INTERVAL)
    }

    pub fn with_interval(
        location: Arc<dyn LocationProvider>,
        storage: LocalStorage,
        sample_interval: Duration,
    ) -> Self {
        Self {
            location,
            storage,
            sample_interval,
            log: Arc::new(Mutex::new(Vec::new())),
            subscription: Mutex::new(None),
        }
    }

    /// Replace the in-memory log with the persisted one.
    ///
    /// A missing or unreadable log loads as empty.
    pub async fn load_saved_points(&self) -> Vec<BreadcrumbPoint> {
        let saved = read_persisted(&self.storage).await;
        let mut log = self.log.lock().await;
        *log = saved.clone();
        saved
    }

    /// Start tracking. Calling this while already tracking is a no-op.
    ///
    /// Fails with [`LocationError::PermissionDenied`] if the user refuses
    /// location access; no subscription is created in that case.
    pub async fn start(&self) -> Result<(), LocationError> {
        let mut subscription = self.subscription.lock().await;
        if subscription.is_some() {
            return Ok(());
        }

        if !self.location.request_permission().await? {
            tracing::warn!("Location permission denied");
            return Err(LocationError::PermissionDenied);
        }

        self.load_saved_points().await;

        // Seed with an immediate fix so the log has a point before the first tick.
        match self.location.current_position().await {
            Ok(fix) => {
                append_point(&self.log, &self.storage, point_from_fix(fix), true).await;
            }
            Err(e) => tracing::warn!(error = %e, "Could not get initial position"),
        }

        let mut fixes = self.location.watch_position(self.sample_interval).await?;
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let log = self.log.clone();
        let storage = self.storage.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    fix = fixes.recv() => match fix {
                        Some(fix) => {
                            append_point(&log, &storage, point_from_fix(fix), false).await;
                        }
                        None => break,
                    },
                }
            }
        });

        *subscription = Some(Subscription { stop_tx, handle });
        tracing::info!(interval_ms = self.sample_interval.as_millis() as u64, "Tracking started");
        Ok(())
    }

    /// Stop tracking. Safe to call when not tracking.
    ///
    /// Returns after any in-flight append has finished.
    pub async fn stop(&self) {
        let Some(subscription) = self.subscription.lock().await.take() else {
            return;
        };
        let _ = subscription.stop_tx.send(());
        if let Err(e) = subscription.handle.await {
            tracing::warn!(error = %e, "Tracking task ended abnormally");
        }
        tracing::info!("Tracking stopped");
    }

    /// Signal the sampling task to stop without waiting for it.
    ///
    /// For synchronous contexts such as `Drop`. The task still finishes any
    /// append it has started. Returns `false` if the subscription is locked by
    /// a concurrent `start` or `stop`.
    pub fn request_stop(&self) -> bool {
        let Ok(mut subscription) = self.subscription.try_lock() else {
            return false;
        };
        if let Some(subscription) = subscription.take() {
            let _ = subscription.stop_tx.send(());
            tracing::info!("Tracking stop requested");
        }
        true
    }

    pub async fn is_tracking(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    /// Empty both the in-memory and persisted log.
    ///
    /// Storage failures are logged and swallowed; memory is cleared regardless.
    pub async fn clear(&self) {
        let mut log = self.log.lock().await;
        if let Err(e) = self
            .storage
            .set_item(keys::BREADCRUMBS, &Vec::<BreadcrumbPoint>::new())
            .await
        {
            tracing::warn!(error = %e, "Failed to clear persisted breadcrumbs");
        }
        log.clear();
    }

    pub async fn points(&self) -> Vec<BreadcrumbPoint> {
        self.log.lock().await.clone()
    }

    pub async fn last_point(&self) -> Option<BreadcrumbPoint> {
        self.log.lock().await.last().copied()
    }

    /// Last point in the persisted log, without touching the in-memory copy.
    pub async fn saved_last_point(&self) -> Option<BreadcrumbPoint> {
        read_persisted(&self.storage).await.last().copied()
    }

    pub async fn distance_km(&self) -> f64 {
        track::distance_km(&self.log.lock().await)
    }
}

fn point_from_fix(fix: PositionFix) -> BreadcrumbPoint {
    BreadcrumbPoint::new(fix.lat, fix.lng, fix.timestamp_ms)
}

async fn read_persisted(storage: &LocalStorage) -> Vec<BreadcrumbPoint> {
    match storage.get_item::<Vec<BreadcrumbPoint>>(keys::BREADCRUMBS).await {
        Ok(points) => points.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load saved breadcrumbs");
            Vec::new()
        }
    }
}

/// Append one point and persist the full log.
///
/// With `skip_duplicate`, a point at the same coordinates as the current last
/// point is dropped.
async fn append_point(
    log: &Mutex<Vec<BreadcrumbPoint>>,
    storage: &LocalStorage,
    point: BreadcrumbPoint,
    skip_duplicate: bool,
) {
    let mut log = log.lock().await;
    if skip_duplicate && log.last().is_some_and(|last| last.same_position(&point)) {
        return;
    }

    let mut updated = log.clone();
    updated.push(point);
    if let Err(e) = storage.set_item(keys::BREADCRUMBS, &updated).await {
        tracing::warn!(error = %e, "Failed to persist breadcrumbs");
    }
    *log = updated;
}
