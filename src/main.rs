// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TrailSafe API Server
//!
//! Serves the hike API used by the mobile app and the overdue sweep trigger
//! that emails emergency contacts of hikers who have not returned.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailsafe::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, HikeStore, MemoryDb},
    services::{scheduler, NotificationSender, PostmarkSender},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting TrailSafe API");

    let store: Arc<dyn HikeStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory hike store; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    let notifier: Option<Arc<dyn NotificationSender>> = match &config.notification {
        Some(notification) => {
            let sender = PostmarkSender::new(notification)?;
            tracing::info!(from = %notification.from_address, "Postmark sender initialized");
            Some(Arc::new(sender))
        }
        None => None,
    };

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        notifier,
    });

    if let Some(interval_secs) = config.sweep_interval_secs {
        match state.overdue_sweep() {
            Some(sweep) => {
                scheduler::spawn_sweep_loop(sweep, Duration::from_secs(interval_secs));
            }
            None => tracing::error!(
                "SWEEP_INTERVAL_SECS is set but no notification provider is configured"
            ),
        }
    }

    // Build router
    let app = trailsafe::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,trailsafe=debug"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
