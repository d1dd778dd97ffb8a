// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process sweep trigger for deployments without an external scheduler.

use crate::services::sweep::OverdueSweep;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a task that runs a sweep pass every `interval`.
///
/// Passes never overlap within this task; overlapping with externally
/// triggered sweeps is safe because the alert latch is a conditional write.
pub fn spawn_sweep_loop(sweep: OverdueSweep, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "Sweep scheduler started");

        loop {
            ticker.tick().await;
            match sweep.run(chrono::Utc::now()).await {
                Ok(summary) if summary.processed > 0 => {
                    tracing::info!(processed = summary.processed, "Scheduled sweep complete");
                }
                Ok(_) => tracing::debug!("Scheduled sweep found no overdue hikes"),
                Err(e) => tracing::error!(error = %e, "Scheduled sweep failed"),
            }
        }
    })
}
