// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TrailSafe: overdue-hike detection and alerting
//!
//! The server side keeps a durable record of each hike and periodically sweeps
//! for hikers who are past their expected return time, emailing their
//! emergency contact exactly once. The `client` module holds the device-side
//! breadcrumb tracker, check-in store and hike session manager that feed it.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::HikeStore;
use services::{NotificationSender, OverdueSweep};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn HikeStore>,
    /// None when the email provider is not configured
    pub notifier: Option<Arc<dyn NotificationSender>>,
}

impl AppState {
    /// Sweep runner, if a notification provider is configured.
    pub fn overdue_sweep(&self) -> Option<OverdueSweep> {
        self.notifier.as_ref().map(|notifier| {
            OverdueSweep::new(
                self.store.clone(),
                notifier.clone(),
                self.config.grace_minutes,
            )
        })
    }
}
