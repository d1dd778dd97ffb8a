// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod breadcrumb;
pub mod checkin;
pub mod hazard;
pub mod hike;

pub use breadcrumb::{BreadcrumbPoint, BreadcrumbRecord};
pub use checkin::CheckInData;
pub use hazard::{Hazard, RECENT_HAZARD_WINDOW_HOURS};
pub use hike::{Hike, HikeStatus};
