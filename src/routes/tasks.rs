// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for scheduled jobs.
//!
//! These endpoints are called by a scheduler (Cloud Scheduler, cron), not by
//! users. When `TASKS_AUTH_TOKEN` is set they require it as a bearer token.

use crate::error::{AppError, Result};
use crate::services::SweepSummary;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

/// Task handler routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/send-overdue-alerts", post(send_overdue_alerts))
}

/// Run one overdue sweep pass.
///
/// Per-hike failures are reported in the body with a 200; only missing
/// configuration or a failed candidate query produce a 500.
async fn send_overdue_alerts(State(state): State<Arc<AppState>>) -> Result<Json<SweepSummary>> {
    let sweep = state.overdue_sweep().ok_or_else(|| {
        AppError::Configuration("Missing environment configuration".to_string())
    })?;

    let summary = sweep.run(chrono::Utc::now()).await?;
    Ok(Json(summary))
}
