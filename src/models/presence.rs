// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Presence index records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters the realtime store refuses in a path segment.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// Coarse locality (city) used to partition the presence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceKey(String);

impl PlaceKey {
    /// Build a key from a geocoder locality name.
    ///
    /// Returns `None` for blank names. Characters that cannot appear in a
    /// store path segment are replaced with `_`.
    pub fn new(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        let key = trimmed
            .chars()
            .map(|c| {
                if FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        Some(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// GeoFire layout of a location record: `{"g": geohash, "l": [lat, lng]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFireRecord {
    /// Geohash of the location
    pub g: String,
    /// `[latitude, longitude]`
    pub l: [f64; 2],
}

/// A driver's current position within one place partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub driver_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PresenceEntry {
    pub fn from_record(driver_id: impl Into<String>, record: &GeoFireRecord) -> Self {
        Self {
            driver_id: driver_id.into(),
            latitude: record.l[0],
            longitude: record.l[1],
        }
    }
}
