// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tests for the scheduler-triggered sweep endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use trailsafe::config::Config;
use trailsafe::db::HikeStore;
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_app_with, located_hike_due_at};

const SWEEP_PATH: &str = "/tasks/send-overdue-alerts";

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_sweep() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(SWEEP_PATH)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_sweep_returns_summary() {
    let app = create_test_app();
    let hike = located_hike_due_at(Utc::now() - Duration::hours(1));
    app.store.create_hike(&hike).await.unwrap();

    let response = app.router.oneshot(post_sweep()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["processed"], 1);
    assert_eq!(json["results"][0]["id"], hike.id.as_str());
    assert_eq!(json["results"][0]["status"], "emailed");
    assert_eq!(app.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_sweep_with_per_hike_failure_still_ok() {
    let app = create_test_app();
    let hike = located_hike_due_at(Utc::now() - Duration::hours(1));
    app.store.create_hike(&hike).await.unwrap();
    app.sender.set_failing(true);

    let response = app.router.oneshot(post_sweep()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["results"][0]["status"], "email_failed");
}

#[tokio::test]
async fn test_sweep_rejects_get() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(SWEEP_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_sweep_without_notification_config_is_500() {
    let mut config = Config::test_default();
    config.notification = None;
    let app = create_test_app_with(config);

    let response = app.router.oneshot(post_sweep()).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "configuration_error");
    assert_eq!(json["details"], "Missing environment configuration");
}

#[tokio::test]
async fn test_sweep_query_failure_is_500() {
    let app = create_test_app();
    app.store.set_fail_query(true);

    let response = app.router.oneshot(post_sweep()).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "database_error");
}

#[tokio::test]
async fn test_sweep_requires_token_when_configured() {
    let mut config = Config::test_default();
    config.tasks_auth_token = Some("scheduler-secret".to_string());
    let app = create_test_app_with(config);

    let response = app.router.clone().oneshot(post_sweep()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(SWEEP_PATH)
                .header("authorization", "Bearer wrong-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(SWEEP_PATH)
                .header("authorization", "Bearer scheduler-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
