// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device-side client for the hike REST API.

use crate::models::BreadcrumbPoint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from hike API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Hike API request failed: {0}")]
    Transport(String),

    #[error("Hike API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected hike API response: {0}")]
    Decode(String),
}

/// Body of `POST /api/hikes`.
#[derive(Debug, Clone, Serialize)]
pub struct StartHikeParams {
    pub trail_id: String,
    pub emergency_contact: String,
    pub expected_return_at: DateTime<Utc>,
}

#[async_trait]
pub trait HikeApi: Send + Sync {
    /// Create the server hike, returning its id.
    async fn start_hike(&self, params: &StartHikeParams) -> Result<String, ApiError>;

    /// Upload one breadcrumb as the hike's latest location.
    async fn record_point(&self, hike_id: &str, point: &BreadcrumbPoint) -> Result<(), ApiError>;

    /// Mark the server hike completed.
    async fn end_hike(&self, hike_id: &str) -> Result<(), ApiError>;
}

#[derive(Deserialize)]
struct CreatedHike {
    id: String,
}

/// [`HikeApi`] over HTTP with a bearer session token.
#[derive(Clone)]
pub struct HttpHikeApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpHikeApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn hike_url(&self, hike_id: &str, action: &str) -> String {
        format!(
            "{}/api/hikes/{}/{}",
            self.base_url,
            urlencoding::encode(hike_id),
            action
        )
    }

    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HikeApi for HttpHikeApi {
    async fn start_hike(&self, params: &StartHikeParams) -> Result<String, ApiError> {
        let response = self
            .http
            .post(format!("{}/api/hikes", self.base_url))
            .bearer_auth(&self.token)
            .json(params)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let created: CreatedHike = self
            .check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(created.id)
    }

    async fn record_point(&self, hike_id: &str, point: &BreadcrumbPoint) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.hike_url(hike_id, "location"))
            .bearer_auth(&self.token)
            .json(point)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        self.check_response(response).await?;
        Ok(())
    }

    async fn end_hike(&self, hike_id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.hike_url(hike_id, "end"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        self.check_response(response).await?;
        Ok(())
    }
}
