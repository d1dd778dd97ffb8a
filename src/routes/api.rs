// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hike API routes for authenticated users.
//!
//! The device calls these to bind a check-in to a server hike, keep the last
//! known location fresh, and end the hike. Hikers can also report trail
//! hazards and read how many were reported recently.

use crate::db::LocationUpdate;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    BreadcrumbPoint, BreadcrumbRecord, Hazard, Hike, HikeStatus, RECENT_HAZARD_WINDOW_HOURS,
};
use crate::services::track;
use crate::time_utils::from_epoch_millis;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/hikes", post(start_hike))
        .route("/api/hikes/{id}", get(get_hike))
        .route("/api/hikes/{id}/location", post(record_location))
        .route("/api/hikes/{id}/end", post(end_hike))
        .route("/api/hikes/{id}/breadcrumbs", get(get_breadcrumbs))
        .route("/api/hazards", post(report_hazard))
        .route("/api/trails/{trail_id}/hazards/recent", get(recent_hazards))
}

/// Load a hike owned by the caller; other users' hikes are reported as missing.
async fn load_owned_hike(state: &AppState, user: &AuthUser, hike_id: &str) -> Result<Hike> {
    match state.store.get_hike(hike_id).await? {
        Some(hike) if hike.user_id == user.user_id => Ok(hike),
        _ => Err(AppError::NotFound(format!("Hike {} not found", hike_id))),
    }
}

// ─── Hike Start ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct StartHikeRequest {
    #[validate(length(min = 1, max = 100))]
    pub trail_id: String,
    #[validate(length(min = 3, max = 254))]
    pub emergency_contact: String,
    pub expected_return_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HikeStateResponse {
    pub id: String,
    pub status: HikeStatus,
}

/// Create an active hike for the caller.
async fn start_hike(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<StartHikeRequest>,
) -> Result<(StatusCode, Json<HikeStateResponse>)> {
    payload.validate()?;

    let now = Utc::now();
    if payload.expected_return_at <= now {
        return Err(AppError::BadRequest(
            "expected_return_at must be in the future".to_string(),
        ));
    }

    let hike = Hike::start(
        user.user_id.clone(),
        payload.trail_id.trim(),
        payload.emergency_contact.trim(),
        payload.expected_return_at,
        now,
    );
    state.store.create_hike(&hike).await?;

    tracing::info!(
        hike_id = %hike.id,
        user_id = %user.user_id,
        expected_return_at = %hike.expected_return_at,
        "Hike started"
    );

    Ok((
        StatusCode::CREATED,
        Json(HikeStateResponse {
            id: hike.id,
            status: hike.status,
        }),
    ))
}

// ─── Location Updates ────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    /// Device timestamp, epoch milliseconds
    pub ts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LocationResponse {
    /// False when the sample was older than the stored location
    pub applied: bool,
}

/// Record a breadcrumb: update last known location and append to the audit log.
async fn record_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(hike_id): Path<String>,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<LocationResponse>> {
    payload.validate()?;
    let recorded_at = from_epoch_millis(payload.ts)
        .ok_or_else(|| AppError::BadRequest("ts is out of range".to_string()))?;

    load_owned_hike(&state, &user, &hike_id).await?;

    let update = state
        .store
        .record_location(&hike_id, payload.lat, payload.lng, recorded_at)
        .await?;

    if update == LocationUpdate::NotFound {
        return Err(AppError::NotFound(format!("Hike {} not found", hike_id)));
    }
    if update == LocationUpdate::Stale {
        tracing::debug!(hike_id = %hike_id, ts = payload.ts, "Ignoring out-of-order location");
    }

    state
        .store
        .append_breadcrumb(&BreadcrumbRecord {
            hike_id: hike_id.clone(),
            lat: payload.lat,
            lng: payload.lng,
            recorded_at,
        })
        .await?;

    Ok(Json(LocationResponse {
        applied: update == LocationUpdate::Applied,
    }))
}

// ─── Hike End / Read ─────────────────────────────────────────

/// End a hike. A hike already flagged overdue stays overdue.
async fn end_hike(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(hike_id): Path<String>,
) -> Result<Json<HikeStateResponse>> {
    load_owned_hike(&state, &user, &hike_id).await?;

    let transition = state.store.complete_hike(&hike_id, Utc::now()).await?;
    let status = transition
        .resulting_status()
        .ok_or_else(|| AppError::NotFound(format!("Hike {} not found", hike_id)))?;

    tracing::info!(hike_id = %hike_id, ?transition, "Hike end requested");

    Ok(Json(HikeStateResponse {
        id: hike_id,
        status,
    }))
}

/// Get a single hike.
async fn get_hike(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(hike_id): Path<String>,
) -> Result<Json<Hike>> {
    Ok(Json(load_owned_hike(&state, &user, &hike_id).await?))
}

#[derive(Debug, Serialize)]
pub struct BreadcrumbsResponse {
    pub hike_id: String,
    pub count: usize,
    pub distance_km: f64,
    pub polyline: String,
    pub geojson: geojson::Feature,
}

/// Breadcrumb audit trail for a hike, oldest first.
async fn get_breadcrumbs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(hike_id): Path<String>,
) -> Result<Json<BreadcrumbsResponse>> {
    load_owned_hike(&state, &user, &hike_id).await?;

    let points: Vec<BreadcrumbPoint> = state
        .store
        .list_breadcrumbs(&hike_id)
        .await?
        .into_iter()
        .map(|r| BreadcrumbPoint::new(r.lat, r.lng, r.recorded_at.timestamp_millis()))
        .collect();

    let polyline = track::encode_polyline(&points)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(Json(BreadcrumbsResponse {
        count: points.len(),
        distance_km: track::distance_km(&points),
        polyline,
        geojson: track::to_geojson(&hike_id, &points),
        hike_id,
    }))
}

// ─── Hazards ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ReportHazardRequest {
    #[validate(length(min = 1, max = 100))]
    pub trail_id: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HazardCreatedResponse {
    pub id: String,
}

/// Record a hazard on a trail, optionally at a position.
async fn report_hazard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ReportHazardRequest>,
) -> Result<(StatusCode, Json<HazardCreatedResponse>)> {
    payload.validate()?;

    let position = match (payload.lat, payload.lng) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "lat and lng must be given together".to_string(),
            ))
        }
    };

    let hazard = Hazard::report(
        user.user_id.clone(),
        payload.trail_id.trim(),
        position,
        payload.note,
        Utc::now(),
    );
    state.store.report_hazard(&hazard).await?;

    Ok((
        StatusCode::CREATED,
        Json(HazardCreatedResponse { id: hazard.id }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentHazardsResponse {
    pub trail_id: String,
    pub count: usize,
    pub since: DateTime<Utc>,
}

/// Hazards reported for a trail within the recent window.
///
/// A failed lookup is reported as zero; the count is advisory.
async fn recent_hazards(
    State(state): State<Arc<AppState>>,
    Path(trail_id): Path<String>,
) -> Json<RecentHazardsResponse> {
    let since = Utc::now() - Duration::hours(RECENT_HAZARD_WINDOW_HOURS);

    let count = match state.store.count_hazards_since(&trail_id, since).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, trail_id = %trail_id, "Failed to count recent hazards");
            0
        }
    };

    Json(RecentHazardsResponse {
        trail_id,
        count,
        since,
    })
}
