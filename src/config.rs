// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Notification provider credentials are optional at startup: without them the
//! hike API still works, but every sweep invocation fails with a configuration
//! error instead of silently skipping alerts.

use std::env;

/// Default grace period added to a hike's expected return time.
pub const DEFAULT_GRACE_MINUTES: i64 = 10;

/// Upper bound for `ALERT_GRACE_MINUTES` (one week).
pub const MAX_GRACE_MINUTES: i64 = 7 * 24 * 60;

/// Default Postmark endpoint for transactional email.
pub const POSTMARK_API_URL: &str = "https://api.postmarkapp.com/email";

/// Which Hike Store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Credentials for the notification provider (Postmark).
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub server_token: String,
    pub from_address: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Hike Store backend
    pub store_backend: StoreBackend,
    /// Minutes past the deadline before a hike is considered overdue
    pub grace_minutes: i64,
    /// Run the sweep in-process every N seconds (None = external trigger only)
    pub sweep_interval_secs: Option<u64>,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Bearer token required on `/tasks/*` when set
    pub tasks_auth_token: Option<String>,
    /// Email provider credentials (None = sweep cannot run)
    pub notification: Option<NotificationConfig>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            grace_minutes: DEFAULT_GRACE_MINUTES,
            sweep_interval_secs: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            tasks_auth_token: None,
            notification: Some(NotificationConfig {
                server_token: "test_postmark_token".to_string(),
                from_address: "alerts@trailsafe.test".to_string(),
                api_url: POSTMARK_API_URL.to_string(),
                timeout_secs: 10,
            }),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let store_backend = match env::var("HIKE_STORE")
            .unwrap_or_else(|_| "firestore".to_string())
            .trim()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            _ => return Err(ConfigError::Invalid("HIKE_STORE")),
        };

        let grace_minutes = match env::var("ALERT_GRACE_MINUTES") {
            Ok(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|m| (0..=MAX_GRACE_MINUTES).contains(m))
                .ok_or(ConfigError::Invalid("ALERT_GRACE_MINUTES"))?,
            Err(_) => DEFAULT_GRACE_MINUTES,
        };

        let sweep_interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or(ConfigError::Invalid("SWEEP_INTERVAL_SECS"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            grace_minutes,
            sweep_interval_secs,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            tasks_auth_token: non_empty_var("TASKS_AUTH_TOKEN"),
            notification: notification_from_env(),
        })
    }
}

/// Postmark settings; all-or-nothing on token and from-address.
fn notification_from_env() -> Option<NotificationConfig> {
    let server_token = non_empty_var("POSTMARK_SERVER_TOKEN");
    let from_address = non_empty_var("POSTMARK_FROM_EMAIL");

    match (server_token, from_address) {
        (Some(server_token), Some(from_address)) => Some(NotificationConfig {
            server_token,
            from_address,
            api_url: non_empty_var("POSTMARK_API_URL")
                .unwrap_or_else(|| POSTMARK_API_URL.to_string()),
            timeout_secs: env::var("NOTIFICATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(10),
        }),
        _ => {
            tracing::warn!("Notification provider not configured; overdue sweeps will fail");
            None
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
