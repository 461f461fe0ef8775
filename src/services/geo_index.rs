// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geospatial index partitioned by place.

use crate::db::{paths, RealtimeStore};
use crate::error::{AppError, Result};
use crate::models::{GeoFireRecord, PlaceKey, PresenceEntry};
use async_trait::async_trait;
use std::sync::Arc;

/// Geohash length written with each record (about 1 m precision).
const GEOHASH_PRECISION: usize = 10;

/// Geospatial index scoped to named partitions.
#[async_trait]
pub trait GeoIndex: Send + Sync {
    /// Store path of the record for `key` in `partition`.
    fn location_path(&self, partition: &PlaceKey, key: &str) -> String;

    async fn set_location(
        &self,
        partition: &PlaceKey,
        key: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<()>;

    async fn remove_location(&self, partition: &PlaceKey, key: &str) -> Result<()>;

    /// Every entry in a partition.
    async fn entries(&self, partition: &PlaceKey) -> Result<Vec<PresenceEntry>>;
}

/// GeoFire-compatible index over a realtime store.
///
/// Records live at `{root}/{partition}/{key}` as `{"g": geohash, "l": [lat, lng]}`.
#[derive(Clone)]
pub struct GeoFireIndex {
    store: Arc<dyn RealtimeStore>,
    root: String,
}

impl GeoFireIndex {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self::with_root(store, paths::DRIVERS_LOCATION)
    }

    pub fn with_root(store: Arc<dyn RealtimeStore>, root: &str) -> Self {
        Self {
            store,
            root: root.to_string(),
        }
    }

    fn partition_path(&self, partition: &PlaceKey) -> String {
        paths::child(&self.root, partition.as_str())
    }
}

/// Build the stored record, rejecting coordinates outside WGS84 bounds.
pub fn encode_record(latitude: f64, longitude: f64) -> Result<GeoFireRecord> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::Publish(format!(
            "Invalid coordinates ({}, {})",
            latitude, longitude
        )));
    }

    let g = geohash::encode(
        geohash::Coord {
            x: longitude,
            y: latitude,
        },
        GEOHASH_PRECISION,
    )
    .map_err(|e| AppError::Publish(format!("Geohash encoding failed: {}", e)))?;

    Ok(GeoFireRecord {
        g,
        l: [latitude, longitude],
    })
}

#[async_trait]
impl GeoIndex for GeoFireIndex {
    fn location_path(&self, partition: &PlaceKey, key: &str) -> String {
        paths::child(&self.partition_path(partition), key)
    }

    async fn set_location(
        &self,
        partition: &PlaceKey,
        key: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<()> {
        let record = encode_record(latitude, longitude)?;
        let value = serde_json::to_value(&record)
            .map_err(|e| AppError::Publish(format!("Record encode failed: {}", e)))?;

        self.store
            .set(&self.location_path(partition, key), value)
            .await
            .map_err(|e| AppError::Publish(e.to_string()))
    }

    async fn remove_location(&self, partition: &PlaceKey, key: &str) -> Result<()> {
        self.store.remove(&self.location_path(partition, key)).await
    }

    async fn entries(&self, partition: &PlaceKey) -> Result<Vec<PresenceEntry>> {
        let snapshot = self.store.get(&self.partition_path(partition)).await?;
        let records: Option<std::collections::BTreeMap<String, GeoFireRecord>> =
            snapshot.deserialize()?;

        Ok(records
            .unwrap_or_default()
            .iter()
            .map(|(key, record)| PresenceEntry::from_record(key.clone(), record))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRealtimeStore;

    #[test]
    fn test_encode_record_geohash() {
        let record = encode_record(37.4219, -122.0840).unwrap();
        assert_eq!(record.g.len(), GEOHASH_PRECISION);
        assert!(record.g.starts_with("9q9h"), "unexpected geohash {}", record.g);
        assert_eq!(record.l, [37.4219, -122.0840]);
    }

    #[test]
    fn test_encode_record_rejects_out_of_range() {
        assert!(encode_record(95.0, 0.0).is_err());
        assert!(encode_record(0.0, 200.0).is_err());
    }

    #[tokio::test]
    async fn test_set_overwrites_and_remove_clears() {
        let store = MemoryRealtimeStore::new();
        let index = GeoFireIndex::new(Arc::new(store.clone()));
        let city = PlaceKey::new("Mountain View").unwrap();

        index.set_location(&city, "d1", 37.42, -122.08).await.unwrap();
        index.set_location(&city, "d1", 37.43, -122.09).await.unwrap();

        let entries = index.entries(&city).await.unwrap();
        assert_eq!(
            entries,
            vec![PresenceEntry {
                driver_id: "d1".to_string(),
                latitude: 37.43,
                longitude: -122.09,
            }]
        );
        assert_eq!(
            index.location_path(&city, "d1"),
            "DriversLocation/Mountain View/d1"
        );

        index.remove_location(&city, "d1").await.unwrap();
        assert!(index.entries(&city).await.unwrap().is_empty());
    }
}
