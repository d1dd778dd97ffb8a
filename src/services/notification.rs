// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional email delivery.
//!
//! The sweep only depends on [`NotificationSender`]; [`PostmarkSender`] is the
//! production implementation. Hung deliveries are bounded by the HTTP client
//! timeout configured here, not by the sweep.

use crate::config::NotificationConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// A plain-text message to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Errors from notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification request failed: {0}")]
    Transport(String),

    #[error("Notification provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Sends a notification; `Ok` means the provider accepted it.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Postmark API client.
#[derive(Clone)]
pub struct PostmarkSender {
    http: reqwest::Client,
    api_url: String,
    server_token: String,
    from_address: String,
}

/// Request body for `POST /email`.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

impl PostmarkSender {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            server_token: config.server_token.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for PostmarkSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let body = PostmarkEmail {
            from: &self.from_address,
            to: &notification.to,
            subject: &notification.subject,
            text_body: &notification.body,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("X-Postmark-Server-Token", &self.server_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Postmark rejected email");
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %notification.to, "Email accepted by Postmark");
        Ok(())
    }
}
