// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Driver profile persistence.

use crate::db::{paths, RealtimeStore};
use crate::error::{AppError, Result};
use crate::models::{DriverProfile, ProfileUpdate};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage for driver profiles keyed by driver ID.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>>;

    /// Create or overwrite a profile.
    async fn put_profile(&self, profile: &DriverProfile) -> Result<()>;

    /// Apply a partial update and return the updated profile.
    async fn update_profile(&self, driver_id: &str, update: &ProfileUpdate)
        -> Result<DriverProfile>;
}

/// Profiles stored under `DriverInfo/{driver_id}` in the realtime store.
#[derive(Clone)]
pub struct RealtimeProfileStore {
    store: Arc<dyn RealtimeStore>,
}

impl RealtimeProfileStore {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    fn path(driver_id: &str) -> String {
        paths::child(paths::DRIVER_INFO, driver_id)
    }
}

#[async_trait]
impl ProfileStore for RealtimeProfileStore {
    async fn get_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>> {
        let snapshot = self.store.get(&Self::path(driver_id)).await?;
        let profile: Option<DriverProfile> = snapshot.deserialize()?;
        Ok(profile.map(|mut p| {
            p.id = driver_id.to_string();
            p
        }))
    }

    async fn put_profile(&self, profile: &DriverProfile) -> Result<()> {
        let value = serde_json::to_value(profile)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Profile encode failed: {}", e)))?;
        self.store.set(&Self::path(&profile.id), value).await?;
        tracing::debug!(driver_id = %profile.id, "Stored driver profile");
        Ok(())
    }

    async fn update_profile(
        &self,
        driver_id: &str,
        update: &ProfileUpdate,
    ) -> Result<DriverProfile> {
        let path = Self::path(driver_id);
        if !self.store.get(&path).await?.exists() {
            return Err(AppError::Database(format!("No profile for driver {}", driver_id)));
        }

        let fields = match serde_json::to_value(update) {
            Ok(serde_json::Value::Object(fields)) => fields,
            Ok(_) => serde_json::Map::new(),
            Err(e) => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Profile update encode failed: {}",
                    e
                )))
            }
        };
        if !fields.is_empty() {
            self.store.update(&path, fields).await?;
        }

        self.get_profile(driver_id)
            .await?
            .ok_or_else(|| AppError::Database(format!("No profile for driver {}", driver_id)))
    }
}
