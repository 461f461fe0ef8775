// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed driver profile store.
//!
//! Profiles live in the `DriverInfo` collection, one document per driver,
//! with the auth user ID as the document ID.

use crate::db::paths;
use crate::error::AppError;
use crate::models::{DriverProfile, ProfileUpdate};
use crate::services::ProfileStore;
use async_trait::async_trait;

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
        // The emulator accepts any token; skip credential discovery
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

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl ProfileStore for FirestoreDb {
    async fn get_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>, AppError> {
        let profile: Option<DriverProfile> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(paths::DRIVER_INFO)
            .obj()
            .one(driver_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(profile.map(|mut p| {
            p.id = driver_id.to_string();
            p
        }))
    }

    async fn put_profile(&self, profile: &DriverProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(paths::DRIVER_INFO)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(driver_id = %profile.id, "Stored driver profile");
        Ok(())
    }

    /// Read-modify-write; profile edits come from a single signed-in device.
    async fn update_profile(
        &self,
        driver_id: &str,
        update: &ProfileUpdate,
    ) -> Result<DriverProfile, AppError> {
        let mut profile = self
            .get_profile(driver_id)
            .await?
            .ok_or_else(|| AppError::Database(format!("No profile for driver {}", driver_id)))?;
        profile.apply(update);
        self.put_profile(&profile).await?;
        Ok(profile)
    }
}
