// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hike session manager: preconditions, upload policy and ending hikes.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trailsafe::client::{
    ApiError, BreadcrumbTracker, CheckInStore, HikeApi, HikeSession, LocalStorage, MemoryStore,
    SessionError, StartHikeParams, UploadResult,
};
use trailsafe::models::{BreadcrumbPoint, CheckInData};

mod common;
use common::{fix, wait_for_points, ScriptedLocation};

const TRAIL: &str = "rancho-san-antonio";

#[derive(Default)]
struct FakeApi {
    started: AtomicUsize,
    points: Mutex<Vec<(String, BreadcrumbPoint)>>,
    ended: Mutex<Vec<String>>,
    fail_start: AtomicBool,
    fail_points: AtomicBool,
    fail_end: AtomicBool,
    start_delay_ms: AtomicU64,
}

impl FakeApi {
    fn uploaded_ts(&self) -> Vec<i64> {
        self.points.lock().unwrap().iter().map(|(_, p)| p.ts).collect()
    }

    fn rejected() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl HikeApi for FakeApi {
    async fn start_hike(&self, params: &StartHikeParams) -> Result<String, ApiError> {
        let delay = self.start_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-{}", params.trail_id, n))
    }

    async fn record_point(&self, hike_id: &str, point: &BreadcrumbPoint) -> Result<(), ApiError> {
        if self.fail_points.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        self.points
            .lock()
            .unwrap()
            .push((hike_id.to_string(), *point));
        Ok(())
    }

    async fn end_hike(&self, hike_id: &str) -> Result<(), ApiError> {
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        self.ended.lock().unwrap().push(hike_id.to_string());
        Ok(())
    }
}

struct Harness {
    session: Arc<HikeSession>,
    location: Arc<ScriptedLocation>,
    api: Arc<FakeApi>,
}

fn harness(granted: bool, upload_interval: Duration) -> Harness {
    let storage = LocalStorage::new(Arc::new(MemoryStore::new()));
    let location = Arc::new(ScriptedLocation::new(granted, Some(fix(37.33, -122.08, 1_000))));
    let api = Arc::new(FakeApi::default());

    let tracker =
        BreadcrumbTracker::with_interval(location.clone(), storage.clone(), Duration::from_millis(10));
    let checkins = CheckInStore::new(storage);
    let session = HikeSession::with_upload_interval(tracker, checkins, api.clone(), upload_interval);

    Harness {
        session: Arc::new(session),
        location,
        api,
    }
}

async fn save_check_in(session: &HikeSession, trail_id: &str) {
    let now = Utc::now().timestamp_millis();
    let data = CheckInData::new("Sam", "sam@example.com", trail_id, now, now + 3_600_000).unwrap();
    session.checkins().save(data).await.unwrap();
}

async fn start(h: &Harness) -> String {
    save_check_in(&h.session, TRAIL).await;
    h.session
        .start_hike(TRAIL, "sam@example.com", Utc::now() + ChronoDuration::hours(1))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_start_requires_check_in_for_trail() {
    let h = harness(true, Duration::from_secs(60));

    let err = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoActiveCheckIn));

    save_check_in(&h.session, "some-other-trail").await;
    let err = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoActiveCheckIn));

    assert!(!h.session.tracker().is_tracking().await);
    assert_eq!(h.api.started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_requires_location_permission() {
    let h = harness(false, Duration::from_secs(60));
    save_check_in(&h.session, TRAIL).await;

    let err = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::LocationPermissionDenied));
    assert_eq!(h.api.started.load(Ordering::SeqCst), 0);
    assert!(h.session.active_hike().is_none());
}

#[tokio::test]
async fn test_server_failure_stops_tracking() {
    let h = harness(true, Duration::from_secs(60));
    save_check_in(&h.session, TRAIL).await;
    h.api.fail_start.store(true, Ordering::SeqCst);

    let err = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Api(_)));
    assert!(!h.session.tracker().is_tracking().await);
    assert!(h.session.active_hike().is_none());

    // Session is usable again afterwards
    h.api.fail_start.store(false, Ordering::SeqCst);
    let id = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now())
        .await
        .unwrap();
    assert_eq!(id, format!("{}-0", TRAIL));
}

#[tokio::test]
async fn test_first_point_uploaded_immediately_and_second_start_rejected() {
    let h = harness(true, Duration::from_secs(60));
    let hike_id = start(&h).await;

    assert_eq!(h.api.uploaded_ts(), vec![1_000]);
    assert_eq!(h.api.points.lock().unwrap()[0].0, hike_id);
    assert_eq!(h.session.active_hike().unwrap().last_uploaded_ts(), Some(1_000));

    let err = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::HikeAlreadyActive));
}

#[tokio::test]
async fn test_upload_policy_throttles_and_skips_unchanged() {
    let h = harness(true, Duration::from_secs(60));
    start(&h).await;
    let now = Utc::now();

    assert_eq!(h.session.upload_tick(now).await, UploadResult::Throttled);

    let later = now + ChronoDuration::seconds(61);
    assert_eq!(h.session.upload_tick(later).await, UploadResult::Unchanged);

    h.location.push(fix(37.34, -122.09, 2_000)).await;
    wait_for_points(h.session.tracker(), 2).await;

    // Within the interval of the previous attempt
    assert_eq!(
        h.session.upload_tick(later + ChronoDuration::seconds(30)).await,
        UploadResult::Throttled
    );
    assert_eq!(
        h.session.upload_tick(later + ChronoDuration::seconds(61)).await,
        UploadResult::Uploaded(2_000)
    );
    assert_eq!(h.api.uploaded_ts(), vec![1_000, 2_000]);
}

#[tokio::test]
async fn test_failed_upload_is_retried() {
    let h = harness(true, Duration::from_secs(60));
    start(&h).await;

    h.location.push(fix(37.34, -122.09, 2_000)).await;
    wait_for_points(h.session.tracker(), 2).await;

    h.api.fail_points.store(true, Ordering::SeqCst);
    let t1 = Utc::now() + ChronoDuration::seconds(61);
    assert_eq!(h.session.upload_tick(t1).await, UploadResult::Failed);
    assert_eq!(h.session.active_hike().unwrap().last_uploaded_ts(), Some(1_000));

    h.api.fail_points.store(false, Ordering::SeqCst);
    let t2 = t1 + ChronoDuration::seconds(61);
    assert_eq!(h.session.upload_tick(t2).await, UploadResult::Uploaded(2_000));
}

#[tokio::test]
async fn test_pause_and_resume() {
    let h = harness(true, Duration::from_secs(60));

    assert!(matches!(
        h.session.pause_hike().await,
        Err(SessionError::NoActiveHike)
    ));

    start(&h).await;
    h.session.pause_hike().await.unwrap();
    assert!(!h.session.tracker().is_tracking().await);
    assert!(h.session.active_hike().is_some());

    h.session.resume_hike().await.unwrap();
    assert!(h.session.tracker().is_tracking().await);
}

#[tokio::test]
async fn test_end_hike() {
    let h = harness(true, Duration::from_secs(60));
    let hike_id = start(&h).await;

    assert!(matches!(
        h.session.end_hike("not-this-one").await,
        Err(SessionError::NoActiveHike)
    ));

    h.session.end_hike(&hike_id).await.unwrap();
    assert!(h.session.active_hike().is_none());
    assert!(!h.session.tracker().is_tracking().await);
    assert_eq!(*h.api.ended.lock().unwrap(), vec![hike_id.clone()]);
    assert_eq!(
        h.session.upload_tick(Utc::now()).await,
        UploadResult::NoActiveHike
    );

    assert!(matches!(
        h.session.end_hike(&hike_id).await,
        Err(SessionError::NoActiveHike)
    ));
}

#[tokio::test]
async fn test_end_hike_server_failure_still_ends_locally() {
    let h = harness(true, Duration::from_secs(60));
    let hike_id = start(&h).await;
    h.api.fail_end.store(true, Ordering::SeqCst);

    let err = h.session.end_hike(&hike_id).await.unwrap_err();
    assert!(matches!(err, SessionError::Api(_)));
    assert!(h.session.active_hike().is_none());
    assert!(!h.session.tracker().is_tracking().await);
}

#[tokio::test]
async fn test_upload_loop_runs_until_hike_ends() {
    let h = harness(true, Duration::from_millis(40));
    let hike_id = start(&h).await;
    let upload_loop = tokio::spawn(h.session.clone().run_upload_loop());

    h.location.push(fix(37.34, -122.09, 2_000)).await;
    tokio::time::timeout(Duration::from_secs(2), async {
        while h.api.uploaded_ts().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loop never uploaded the new point");
    assert_eq!(h.api.uploaded_ts(), vec![1_000, 2_000]);

    h.session.end_hike(&hike_id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), upload_loop)
        .await
        .expect("upload loop did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_first_point_after_failed_seed_is_not_throttled() {
    let h = harness(true, Duration::from_secs(60));
    h.location.set_seed(None);
    start(&h).await;
    assert!(h.api.uploaded_ts().is_empty());

    h.location.push(fix(37.34, -122.09, 5_000)).await;
    wait_for_points(h.session.tracker(), 1).await;

    let soon = Utc::now() + ChronoDuration::seconds(1);
    assert_eq!(h.session.upload_tick(soon).await, UploadResult::Uploaded(5_000));
    assert_eq!(h.api.uploaded_ts(), vec![5_000]);
}

#[tokio::test]
async fn test_new_hike_never_uploads_previous_hike_points() {
    let h = harness(true, Duration::from_secs(60));
    let first_id = start(&h).await;
    h.session.end_hike(&first_id).await.unwrap();

    // No fresh fix for the second hike
    h.location.set_seed(None);
    save_check_in(&h.session, "trail-b").await;
    let second_id = h
        .session
        .start_hike("trail-b", "sam@example.com", Utc::now() + ChronoDuration::hours(1))
        .await
        .unwrap();

    let uploads: Vec<String> = h
        .api
        .points
        .lock()
        .unwrap()
        .iter()
        .map(|(id, _)| id.clone())
        .collect();
    assert_eq!(uploads, vec![first_id.clone()]);
    assert_eq!(h.session.active_hike().unwrap().last_uploaded_ts(), None);
    assert_eq!(
        h.session.upload_tick(Utc::now() + ChronoDuration::seconds(1)).await,
        UploadResult::NoPoints
    );

    h.location.push(fix(37.40, -122.10, 9_000)).await;
    wait_for_points(h.session.tracker(), 2).await;
    assert_eq!(
        h.session.upload_tick(Utc::now() + ChronoDuration::seconds(2)).await,
        UploadResult::Uploaded(9_000)
    );
    let last = h.api.points.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.0, second_id);
    assert_eq!(last.1, BreadcrumbPoint::new(37.40, -122.10, 9_000));
}

#[tokio::test]
async fn test_seed_at_previous_position_is_not_reused() {
    let h = harness(true, Duration::from_secs(60));
    let first_id = start(&h).await;
    h.session.end_hike(&first_id).await.unwrap();

    // Same coordinates as the last logged point; the seed is deduplicated
    h.location.set_seed(Some(fix(37.33, -122.08, 50_000)));
    start(&h).await;

    assert_eq!(h.api.uploaded_ts(), vec![1_000]);
    assert_eq!(h.session.active_hike().unwrap().last_uploaded_ts(), None);
}

#[tokio::test]
async fn test_abandoned_start_releases_session() {
    let h = harness(true, Duration::from_secs(60));
    save_check_in(&h.session, TRAIL).await;
    h.api.start_delay_ms.store(500, Ordering::SeqCst);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        h.session
            .start_hike(TRAIL, "sam@example.com", Utc::now() + ChronoDuration::hours(1)),
    )
    .await;
    assert!(abandoned.is_err());

    assert!(!h.session.tracker().is_tracking().await);
    assert!(h.session.active_hike().is_none());

    h.api.start_delay_ms.store(0, Ordering::SeqCst);
    let id = h
        .session
        .start_hike(TRAIL, "sam@example.com", Utc::now() + ChronoDuration::hours(1))
        .await
        .unwrap();
    assert_eq!(h.session.active_hike().unwrap().id, id);
    assert!(h.session.tracker().is_tracking().await);
}
