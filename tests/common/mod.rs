// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use trailsafe::client::{BreadcrumbTracker, LocationError, LocationProvider, PositionFix};
use trailsafe::config::Config;
use trailsafe::db::{EndTransition, FirestoreDb, HikeStore, LocationUpdate, MemoryDb};
use trailsafe::error::AppError;
use trailsafe::middleware::auth::create_jwt;
use trailsafe::models::{BreadcrumbRecord, Hazard, Hike};
use trailsafe::routes::create_router;
use trailsafe::services::{Notification, NotificationError, NotificationSender};
use trailsafe::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Fixed reference time for sweep scenarios.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

/// An active hike for `user-1` due back at `deadline`.
#[allow(dead_code)]
pub fn hike_due_at(deadline: DateTime<Utc>) -> Hike {
    Hike::start(
        "user-1",
        "trail-rancho",
        "contact@example.com",
        deadline,
        deadline - Duration::hours(3),
    )
}

/// Same as [`hike_due_at`] with a last known location.
#[allow(dead_code)]
pub fn located_hike_due_at(deadline: DateTime<Utc>) -> Hike {
    let mut hike = hike_due_at(deadline);
    hike.apply_location(37.3318, -122.0312, deadline - Duration::minutes(30));
    hike
}

/// Notification sender that records messages and can be made to fail.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl RecordingSender {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Rejected {
                status: 500,
                body: "provider down".to_string(),
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Memory store whose latch write or candidate query can be made to fail.
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryDb,
    fail_mark: AtomicBool,
    fail_query: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn set_fail_mark(&self, fail: bool) {
        self.fail_mark.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl HikeStore for FlakyStore {
    async fn create_hike(&self, hike: &Hike) -> Result<(), AppError> {
        self.inner.create_hike(hike).await
    }

    async fn get_hike(&self, hike_id: &str) -> Result<Option<Hike>, AppError> {
        self.inner.get_hike(hike_id).await
    }

    async fn record_location(
        &self,
        hike_id: &str,
        lat: f64,
        lng: f64,
        at: DateTime<Utc>,
    ) -> Result<LocationUpdate, AppError> {
        self.inner.record_location(hike_id, lat, lng, at).await
    }

    async fn append_breadcrumb(&self, record: &BreadcrumbRecord) -> Result<(), AppError> {
        self.inner.append_breadcrumb(record).await
    }

    async fn list_breadcrumbs(&self, hike_id: &str) -> Result<Vec<BreadcrumbRecord>, AppError> {
        self.inner.list_breadcrumbs(hike_id).await
    }

    async fn complete_hike(
        &self,
        hike_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<EndTransition, AppError> {
        self.inner.complete_hike(hike_id, ended_at).await
    }

    async fn find_overdue_candidates(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Hike>, AppError> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(AppError::Database("query unavailable".to_string()));
        }
        self.inner.find_overdue_candidates(threshold).await
    }

    async fn mark_alerted(&self, hike_id: &str) -> Result<bool, AppError> {
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(AppError::Database("write rejected".to_string()));
        }
        self.inner.mark_alerted(hike_id).await
    }

    async fn report_hazard(&self, hazard: &Hazard) -> Result<(), AppError> {
        self.inner.report_hazard(hazard).await
    }

    async fn count_hazards_since(
        &self,
        trail_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        self.inner.count_hazards_since(trail_id, since).await
    }
}

/// Router plus handles on its fakes.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<FlakyStore>,
    pub sender: Arc<RecordingSender>,
}

/// Create a test app with in-memory store and recording sender.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let store = Arc::new(FlakyStore::default());
    let sender = Arc::new(RecordingSender::default());
    let notifier: Option<Arc<dyn NotificationSender>> = if config.notification.is_some() {
        Some(sender.clone() as Arc<dyn NotificationSender>)
    } else {
        None
    };

    let state = Arc::new(AppState {
        config,
        store: store.clone(),
        notifier,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        sender,
    }
}

/// Session token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn test_token(user_id: &str) -> String {
    create_jwt(user_id, &Config::test_default().jwt_signing_key).expect("Failed to create JWT")
}

/// Location provider driven by the test: a fixed seed fix plus fixes pushed
/// into the active subscription.
#[allow(dead_code)]
pub struct ScriptedLocation {
    granted: AtomicBool,
    seed: Mutex<Option<PositionFix>>,
    feed: Mutex<Option<mpsc::Sender<PositionFix>>>,
}

#[allow(dead_code)]
impl ScriptedLocation {
    pub fn new(granted: bool, seed: Option<PositionFix>) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            seed: Mutex::new(seed),
            feed: Mutex::new(None),
        }
    }

    pub fn set_seed(&self, seed: Option<PositionFix>) {
        *self.seed.lock().unwrap() = seed;
    }

    /// Deliver a fix to the current subscription.
    pub async fn push(&self, fix: PositionFix) {
        let feed = self.feed.lock().unwrap().clone();
        feed.expect("no active subscription")
            .send(fix)
            .await
            .expect("subscription closed");
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocation {
    async fn request_permission(&self) -> Result<bool, LocationError> {
        Ok(self.granted.load(Ordering::SeqCst))
    }

    async fn current_position(&self) -> Result<PositionFix, LocationError> {
        (*self.seed.lock().unwrap())
            .ok_or_else(|| LocationError::Unavailable("no fix yet".to_string()))
    }

    async fn watch_position(
        &self,
        _interval: std::time::Duration,
    ) -> Result<mpsc::Receiver<PositionFix>, LocationError> {
        let (tx, rx) = mpsc::channel(16);
        *self.feed.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

#[allow(dead_code)]
pub fn fix(lat: f64, lng: f64, timestamp_ms: i64) -> PositionFix {
    PositionFix {
        lat,
        lng,
        timestamp_ms,
    }
}

/// Wait until the tracker holds at least `count` points.
#[allow(dead_code)]
pub async fn wait_for_points(tracker: &BreadcrumbTracker, count: usize) {
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while tracker.points().await.len() < count {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for breadcrumbs");
}
