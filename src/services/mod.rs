// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod alert;
pub mod notification;
pub mod scheduler;
pub mod sweep;
pub mod track;

pub use notification::{Notification, NotificationError, NotificationSender, PostmarkSender};
pub use sweep::{HikeSweepResult, OverdueSweep, SweepOutcome, SweepSummary};
