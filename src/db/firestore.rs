// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Hikes (lifecycle, last known location, alert latch)
//! - Breadcrumbs (append-only audit log)
//!
//! Status transitions read the hike inside a transaction and commit the write
//! in the same transaction. Firestore aborts a commit if the document changed
//! after the transactional read, so two racing sweeps cannot both flip the
//! alert latch, and a sweep cannot overwrite a concurrent `completed`.

use crate::db::{collections, EndTransition, HikeStore, LocationUpdate};
use crate::error::AppError;
use crate::models::{BreadcrumbRecord, Hazard, Hike, HikeStatus};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Read a hike inside `transaction`, apply `update`, and commit.
    ///
    /// `update` returns `(result, write)`; when `write` is false the
    /// transaction is rolled back and nothing is written.
    async fn transact_hike<R, F>(&self, hike_id: &str, update: F) -> Result<Option<R>, AppError>
    where
        F: FnOnce(&mut Hike) -> (R, bool),
    {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through this handle are registered with the transaction for
        // conflict detection.
        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let current: Option<Hike> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::HIKES)
            .obj()
            .one(hike_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read hike in transaction: {}", e))
            })?;

        let Some(mut hike) = current else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        let (result, write) = update(&mut hike);
        if !write {
            let _ = transaction.rollback().await;
            return Ok(Some(result));
        }

        client
            .fluent()
            .update()
            .in_col(collections::HIKES)
            .document_id(hike_id)
            .object(&hike)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add hike to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(Some(result))
    }
}

#[async_trait]
impl HikeStore for FirestoreDb {
    // ─── Hike Operations ─────────────────────────────────────────

    async fn create_hike(&self, hike: &Hike) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::HIKES)
            .document_id(&hike.id)
            .object(hike)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(hike_id = %hike.id, trail_id = %hike.trail_id, "Hike created");
        Ok(())
    }

    async fn get_hike(&self, hike_id: &str) -> Result<Option<Hike>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::HIKES)
            .obj()
            .one(hike_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn record_location(
        &self,
        hike_id: &str,
        lat: f64,
        lng: f64,
        at: DateTime<Utc>,
    ) -> Result<LocationUpdate, AppError> {
        let outcome = self
            .transact_hike(hike_id, |hike| {
                let applied = hike.apply_location(lat, lng, at);
                (applied, applied)
            })
            .await?;

        Ok(match outcome {
            Some(true) => LocationUpdate::Applied,
            Some(false) => LocationUpdate::Stale,
            None => LocationUpdate::NotFound,
        })
    }

    async fn complete_hike(
        &self,
        hike_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<EndTransition, AppError> {
        let outcome = self
            .transact_hike(hike_id, |hike| {
                let stamp = hike.ended_at.is_none();
                if stamp {
                    hike.ended_at = Some(ended_at);
                }
                match hike.status {
                    HikeStatus::Active => {
                        hike.status = HikeStatus::Completed;
                        (EndTransition::Completed, true)
                    }
                    HikeStatus::Completed => (EndTransition::AlreadyCompleted, stamp),
                    HikeStatus::Overdue => (EndTransition::AlreadyOverdue, stamp),
                }
            })
            .await?;

        Ok(outcome.unwrap_or(EndTransition::NotFound))
    }

    async fn find_overdue_candidates(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Hike>, AppError> {
        let threshold = format_utc_rfc3339(threshold);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::HIKES)
            .filter(move |q| {
                q.for_all([
                    q.field("status").eq(HikeStatus::Active.as_str()),
                    q.field("alert_sent").eq(false),
                    q.field("expected_return_at").less_than(threshold.clone()),
                ])
            })
            .order_by([(
                "expected_return_at",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn mark_alerted(&self, hike_id: &str) -> Result<bool, AppError> {
        let outcome = self
            .transact_hike(hike_id, |hike| {
                if !hike.is_alert_eligible() {
                    return (false, false);
                }
                hike.alert_sent = true;
                hike.status = HikeStatus::Overdue;
                (true, true)
            })
            .await?;

        Ok(outcome.unwrap_or(false))
    }

    // ─── Breadcrumb Operations ───────────────────────────────────

    async fn append_breadcrumb(&self, record: &BreadcrumbRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BREADCRUMBS)
            .document_id(record.document_id())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_breadcrumbs(&self, hike_id: &str) -> Result<Vec<BreadcrumbRecord>, AppError> {
        let hike_id = hike_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::BREADCRUMBS)
            .filter(move |q| q.for_all([q.field("hike_id").eq(hike_id.clone())]))
            .order_by([("recorded_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Hazard Operations ───────────────────────────────────────

    async fn report_hazard(&self, hazard: &Hazard) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::HAZARDS)
            .document_id(&hazard.id)
            .object(hazard)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(hazard_id = %hazard.id, trail_id = %hazard.trail_id, "Hazard reported");
        Ok(())
    }

    async fn count_hazards_since(
        &self,
        trail_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let trail_id = trail_id.to_string();
        let since = format_utc_rfc3339(since);

        let hazards: Vec<Hazard> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::HAZARDS)
            .filter(move |q| {
                q.for_all([
                    q.field("trail_id").eq(trail_id.clone()),
                    q.field("created_at").greater_than_or_equal(since.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(hazards.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_client_reports_database_errors() {
        let db = FirestoreDb::new_mock();

        let err = db.get_hike("h1").await.unwrap_err();
        assert!(err.is_database_error());

        let err = db.mark_alerted("h1").await.unwrap_err();
        assert!(err.is_database_error());
    }
}
