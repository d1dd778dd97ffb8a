// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device-side hike core.
//!
//! Platform shells supply a [`LocationProvider`] and a [`KeyValueStore`];
//! everything else (breadcrumb log, check-in, server hike binding and upload
//! policy) lives here.

pub mod api;
pub mod checkin;
pub mod location;
pub mod session;
pub mod storage;
pub mod tracker;

pub use api::{ApiError, HikeApi, HttpHikeApi, StartHikeParams};
pub use checkin::{CheckInStatus, CheckInStore};
pub use location::{LocationError, LocationProvider, PositionFix};
pub use session::{ActiveHike, HikeSession, SessionError, UploadResult};
pub use storage::{FileStore, KeyValueStore, LocalStorage, MemoryStore, StorageError};
pub use tracker::BreadcrumbTracker;
