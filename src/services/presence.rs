// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Presence publishing for the signed-in driver.

use crate::db::RealtimeStore;
use crate::error::{AppError, Result};
use crate::models::{PlaceKey, PositionFix};
use crate::services::GeoIndex;
use std::sync::Arc;

/// Where the driver's presence entry lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRef {
    pub place: PlaceKey,
    /// Full store path of the entry
    pub path: String,
}

/// Writes and withdraws one driver's presence entry.
#[derive(Clone)]
pub struct PresencePublisher {
    index: Arc<dyn GeoIndex>,
    store: Arc<dyn RealtimeStore>,
    driver_id: String,
}

impl PresencePublisher {
    pub fn new(index: Arc<dyn GeoIndex>, store: Arc<dyn RealtimeStore>, driver_id: &str) -> Self {
        Self {
            index,
            store,
            driver_id: driver_id.to_string(),
        }
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    /// Reference to this driver's entry in a place partition.
    pub fn reference(&self, place: &PlaceKey) -> PresenceRef {
        PresenceRef {
            place: place.clone(),
            path: self.index.location_path(place, &self.driver_id),
        }
    }

    /// Upsert the driver's entry in `place`.
    pub async fn publish(&self, place: &PlaceKey, fix: &PositionFix) -> Result<()> {
        self.index
            .set_location(place, &self.driver_id, fix.latitude, fix.longitude)
            .await
            .map_err(|e| match e {
                AppError::Publish(_) => e,
                other => AppError::Publish(other.to_string()),
            })?;

        tracing::debug!(
            driver_id = %self.driver_id,
            place = %place,
            latitude = fix.latitude,
            longitude = fix.longitude,
            "Published presence"
        );
        Ok(())
    }

    /// Remove the entry, then cancel its disconnect directive.
    ///
    /// If the removal fails the directive is left armed so a disconnect still
    /// clears the entry.
    pub async fn withdraw(&self, reference: &PresenceRef) -> Result<()> {
        self.index
            .remove_location(&reference.place, &self.driver_id)
            .await?;
        self.store.cancel_on_disconnect(&reference.path).await?;

        tracing::info!(
            driver_id = %self.driver_id,
            place = %reference.place,
            "Withdrew presence"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRealtimeStore;
    use crate::services::GeoFireIndex;

    fn publisher(store: &MemoryRealtimeStore) -> PresencePublisher {
        let shared: Arc<dyn RealtimeStore> = Arc::new(store.clone());
        PresencePublisher::new(Arc::new(GeoFireIndex::new(shared.clone())), shared, "d1")
    }

    #[tokio::test]
    async fn test_publish_then_withdraw() {
        let store = MemoryRealtimeStore::new();
        let publisher = publisher(&store);
        let city = PlaceKey::new("Mountain View").unwrap();
        let reference = publisher.reference(&city);
        assert_eq!(reference.path, "DriversLocation/Mountain View/d1");

        publisher
            .publish(&city, &PositionFix::new(37.4219, -122.0840))
            .await
            .unwrap();
        store.on_disconnect_remove(&reference.path).await.unwrap();
        assert!(store.get(&reference.path).await.unwrap().exists());

        publisher.withdraw(&reference).await.unwrap();
        assert!(!store.get(&reference.path).await.unwrap().exists());
        assert!(store.pending_disconnects().is_empty());
    }

    #[tokio::test]
    async fn test_failed_withdraw_keeps_directive() {
        let store = MemoryRealtimeStore::new();
        let publisher = publisher(&store);
        let city = PlaceKey::new("Palo Alto").unwrap();
        let reference = publisher.reference(&city);
        publisher
            .publish(&city, &PositionFix::new(37.4419, -122.1430))
            .await
            .unwrap();
        store.on_disconnect_remove(&reference.path).await.unwrap();

        store.reject_writes(true);
        assert!(publisher.withdraw(&reference).await.is_err());
        assert!(store.get(&reference.path).await.unwrap().exists());
        assert_eq!(store.pending_disconnects(), vec![reference.path.clone()]);

        store.reject_writes(false);
        publisher.withdraw(&reference).await.unwrap();
        assert!(!store.get(&reference.path).await.unwrap().exists());
        assert!(store.pending_disconnects().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_is_publish_failure() {
        let store = MemoryRealtimeStore::new();
        store.reject_writes(true);
        let err = publisher(&store)
            .publish(
                &PlaceKey::new("Mountain View").unwrap(),
                &PositionFix::new(37.4219, -122.0840),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "publish_failure");
    }
}
