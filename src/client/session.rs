// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hike session manager.
//!
//! Binds the active check-in to a server hike, drives the tracker through
//! start/pause/resume/end, and uploads the latest breadcrumb on a timer.

use super::api::{ApiError, HikeApi, StartHikeParams};
use super::checkin::CheckInStore;
use super::location::LocationError;
use super::tracker::BreadcrumbTracker;
use crate::models::BreadcrumbPoint;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Minimum spacing between timer-driven uploads.
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Marker value for "nothing uploaded / attempted yet".
const NEVER: i64 = i64::MIN;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No check-in for this trail")]
    NoActiveCheckIn,

    #[error("Location permission not granted")]
    LocationPermissionDenied,

    #[error("A hike is already active")]
    HikeAlreadyActive,

    #[error("No active hike")]
    NoActiveHike,

    #[error("Location unavailable: {0}")]
    Location(LocationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<LocationError> for SessionError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::PermissionDenied => SessionError::LocationPermissionDenied,
            other => SessionError::Location(other),
        }
    }
}

/// Result of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadResult {
    /// Point with this timestamp was accepted by the server
    Uploaded(i64),
    /// Latest point was already uploaded
    Unchanged,
    /// Interval since the previous attempt has not elapsed
    Throttled,
    /// Another upload claimed the marker first
    InFlight,
    /// No point has been logged since the hike started
    NoPoints,
    NoActiveHike,
    /// Logged; retried on the next tick
    Failed,
}

/// Server hike bound to this device.
#[derive(Debug)]
pub struct ActiveHike {
    pub id: String,
    pub trail_id: String,
    pub started_at: DateTime<Utc>,
    /// Last logged point from before this hike; never uploaded for it.
    prior_point: Option<BreadcrumbPoint>,
    last_uploaded_ts: AtomicI64,
    last_attempt_ms: AtomicI64,
}

impl ActiveHike {
    fn new(
        id: String,
        trail_id: String,
        started_at: DateTime<Utc>,
        prior_point: Option<BreadcrumbPoint>,
    ) -> Self {
        Self {
            id,
            trail_id,
            started_at,
            prior_point,
            last_uploaded_ts: AtomicI64::new(NEVER),
            last_attempt_ms: AtomicI64::new(NEVER),
        }
    }

    /// Timestamp of the last point the server accepted.
    pub fn last_uploaded_ts(&self) -> Option<i64> {
        match self.last_uploaded_ts.load(Ordering::SeqCst) {
            NEVER => None,
            ts => Some(ts),
        }
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    Idle,
    /// Reserved while the server hike is being created
    Starting,
    Hiking(Arc<ActiveHike>),
}

/// Holds the `Starting` slot for one `start_hike` call.
///
/// If the call is dropped before it settles, the slot returns to `Idle` and
/// the tracker is told to stop.
struct StartReservation<'a> {
    session: &'a HikeSession,
    settled: bool,
}

impl StartReservation<'_> {
    fn settle(mut self, next: SessionState) {
        *self.session.lock_state() = next;
        self.settled = true;
    }
}

impl Drop for StartReservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        {
            let mut state = self.session.lock_state();
            if matches!(*state, SessionState::Starting) {
                *state = SessionState::Idle;
            }
        }
        if !self.session.tracker.request_stop() {
            tracing::warn!("Abandoned hike start could not stop tracking");
        }
        tracing::warn!("Hike start abandoned before completion");
    }
}

pub struct HikeSession {
    tracker: BreadcrumbTracker,
    checkins: CheckInStore,
    api: Arc<dyn HikeApi>,
    upload_interval: Duration,
    state: Mutex<SessionState>,
}

impl HikeSession {
    pub fn new(tracker: BreadcrumbTracker, checkins: CheckInStore, api: Arc<dyn HikeApi>) -> Self {
        Self::with_upload_interval(tracker, checkins, api, DEFAULT_UPLOAD_INTERVAL)
    }

    pub fn with_upload_interval(
        tracker: BreadcrumbTracker,
        checkins: CheckInStore,
        api: Arc<dyn HikeApi>,
        upload_interval: Duration,
    ) -> Self {
        Self {
            tracker,
            checkins,
            api,
            upload_interval,
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn tracker(&self) -> &BreadcrumbTracker {
        &self.tracker
    }

    pub fn checkins(&self) -> &CheckInStore {
        &self.checkins
    }

    pub fn active_hike(&self) -> Option<Arc<ActiveHike>> {
        match &*self.lock_state() {
            SessionState::Hiking(hike) => Some(hike.clone()),
            _ => None,
        }
    }

    /// Start tracking and create the server hike for the saved check-in.
    ///
    /// The first breadcrumb is uploaded immediately; its failure is logged and
    /// left for the upload loop.
    pub async fn start_hike(
        &self,
        trail_id: &str,
        emergency_contact: &str,
        expected_return_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let reservation = {
            let mut state = self.lock_state();
            if !matches!(*state, SessionState::Idle) {
                return Err(SessionError::HikeAlreadyActive);
            }
            *state = SessionState::Starting;
            StartReservation {
                session: self,
                settled: false,
            }
        };

        let hike = match self
            .bind_hike(trail_id, emergency_contact, expected_return_at)
            .await
        {
            Ok(hike) => hike,
            Err(e) => {
                reservation.settle(SessionState::Idle);
                return Err(e);
            }
        };

        reservation.settle(SessionState::Hiking(hike.clone()));
        tracing::info!(hike_id = %hike.id, trail_id = %trail_id, "Hike started");

        // Arm the throttle only once a point has actually been offered
        let attempt_ms = Utc::now().timestamp_millis();
        if self.upload_latest(&hike).await != UploadResult::NoPoints {
            let _ = hike.last_attempt_ms.compare_exchange(
                NEVER,
                attempt_ms,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
        Ok(hike.id.clone())
    }

    async fn bind_hike(
        &self,
        trail_id: &str,
        emergency_contact: &str,
        expected_return_at: DateTime<Utc>,
    ) -> Result<Arc<ActiveHike>, SessionError> {
        let has_check_in = self
            .checkins
            .load()
            .await
            .is_some_and(|c| c.trail_id == trail_id);
        if !has_check_in {
            return Err(SessionError::NoActiveCheckIn);
        }

        let prior_point = self.tracker.saved_last_point().await;
        self.tracker.start().await?;

        let params = StartHikeParams {
            trail_id: trail_id.to_string(),
            emergency_contact: emergency_contact.to_string(),
            expected_return_at,
        };
        match self.api.start_hike(&params).await {
            Ok(id) => Ok(Arc::new(ActiveHike::new(
                id,
                trail_id.to_string(),
                Utc::now(),
                prior_point,
            ))),
            Err(e) => {
                tracing::error!(error = %e, trail_id = %trail_id, "Failed to create server hike");
                self.tracker.stop().await;
                Err(e.into())
            }
        }
    }

    /// Stop sampling without ending the server hike.
    pub async fn pause_hike(&self) -> Result<(), SessionError> {
        self.active_hike().ok_or(SessionError::NoActiveHike)?;
        self.tracker.stop().await;
        Ok(())
    }

    pub async fn resume_hike(&self) -> Result<(), SessionError> {
        self.active_hike().ok_or(SessionError::NoActiveHike)?;
        self.tracker.start().await?;
        Ok(())
    }

    /// End the hike locally and on the server.
    ///
    /// The local hike ends even if the server call fails; the failure is
    /// returned so the caller can tell the user.
    pub async fn end_hike(&self, hike_id: &str) -> Result<(), SessionError> {
        {
            let mut state = self.lock_state();
            match &*state {
                SessionState::Hiking(hike) if hike.id == hike_id => {
                    *state = SessionState::Idle;
                }
                _ => return Err(SessionError::NoActiveHike),
            }
        }

        self.tracker.stop().await;

        if let Err(e) = self.api.end_hike(hike_id).await {
            tracing::error!(error = %e, hike_id = %hike_id, "Failed to end server hike");
            return Err(e.into());
        }
        tracing::info!(hike_id = %hike_id, "Hike ended");
        Ok(())
    }

    /// Upload the latest point if the interval has elapsed since the last attempt.
    pub async fn upload_tick(&self, now: DateTime<Utc>) -> UploadResult {
        let Some(hike) = self.active_hike() else {
            return UploadResult::NoActiveHike;
        };

        let now_ms = now.timestamp_millis();
        let interval_ms = i64::try_from(self.upload_interval.as_millis()).unwrap_or(i64::MAX);
        let last_attempt = hike.last_attempt_ms.load(Ordering::SeqCst);
        if last_attempt != NEVER && now_ms.saturating_sub(last_attempt) < interval_ms {
            return UploadResult::Throttled;
        }
        if hike
            .last_attempt_ms
            .compare_exchange(last_attempt, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return UploadResult::Throttled;
        }

        let result = self.upload_latest(&hike).await;
        if result == UploadResult::NoPoints {
            // Nothing was offered; the first point of the hike goes out on the next tick
            let _ = hike.last_attempt_ms.compare_exchange(
                now_ms,
                last_attempt,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
        result
    }

    async fn upload_latest(&self, hike: &ActiveHike) -> UploadResult {
        let Some(point) = self.tracker.last_point().await else {
            return UploadResult::NoPoints;
        };
        if hike.prior_point == Some(point) {
            return UploadResult::NoPoints;
        }

        let previous = hike.last_uploaded_ts.load(Ordering::SeqCst);
        if previous == point.ts {
            return UploadResult::Unchanged;
        }
        if hike
            .last_uploaded_ts
            .compare_exchange(previous, point.ts, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return UploadResult::InFlight;
        }

        match self.api.record_point(&hike.id, &point).await {
            Ok(()) => {
                tracing::debug!(hike_id = %hike.id, ts = point.ts, "Breadcrumb uploaded");
                UploadResult::Uploaded(point.ts)
            }
            Err(e) => {
                let _ = hike.last_uploaded_ts.compare_exchange(
                    point.ts,
                    previous,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                tracing::warn!(error = %e, hike_id = %hike.id, "Breadcrumb upload failed");
                UploadResult::Failed
            }
        }
    }

    /// Run the timer-driven upload policy until the current hike ends.
    ///
    /// Ticks several times per upload interval; [`Self::upload_tick`] does the
    /// gating.
    pub async fn run_upload_loop(self: Arc<Self>) {
        let Some(hike) = self.active_hike() else {
            return;
        };
        let period = (self.upload_interval / 4).max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.active_hike() {
                Some(current) if current.id == hike.id => {}
                _ => break,
            }
            self.upload_tick(Utc::now()).await;
        }
        tracing::debug!(hike_id = %hike.id, "Upload loop finished");
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
