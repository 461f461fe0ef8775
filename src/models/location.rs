// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Position fixes and location request parameters.

use chrono::{DateTime, Utc};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single GPS position reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// When the fix was taken (most recent wins)
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    /// Create a fix stamped with the current time.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    pub fn at(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Whether the coordinates are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// The fix as a geo point (x = longitude, y = latitude).
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Great-circle distance to another fix, in meters.
    pub fn distance_to(&self, other: &PositionFix) -> f64 {
        Haversine.distance(self.point(), other.point())
    }
}

/// Accuracy/power trade-off requested from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    HighAccuracy,
    BalancedPowerAccuracy,
    LowPower,
}

/// Parameters for a location update stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRequest {
    /// Normal delivery interval
    pub interval: Duration,
    /// Fastest interval the caller can handle
    pub fastest_interval: Duration,
    /// Fixes closer than this to the last delivered fix are suppressed (meters)
    pub smallest_displacement_m: f64,
    pub priority: Priority,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            fastest_interval: Duration::from_millis(3000),
            smallest_displacement_m: 10.0,
            priority: Priority::HighAccuracy,
        }
    }
}

impl LocationRequest {
    /// Reject cadences no location source can honor.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval.is_zero() {
            return Err("location interval must be greater than zero".to_string());
        }
        if self.smallest_displacement_m.is_nan() || self.smallest_displacement_m < 0.0 {
            return Err(format!(
                "smallest displacement must be non-negative, got {}",
                self.smallest_displacement_m
            ));
        }
        Ok(())
    }
}

/// OS-level location permission as seen by the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Fine,
    Coarse,
    Denied,
}

impl PermissionStatus {
    /// Fine or coarse access is enough to start location updates.
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Fine | PermissionStatus::Coarse)
    }
}

impl std::str::FromStr for PermissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fine" => Ok(PermissionStatus::Fine),
            "coarse" => Ok(PermissionStatus::Coarse),
            "denied" | "none" => Ok(PermissionStatus::Denied),
            other => Err(format!("unknown permission status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_matches_driver_cadence() {
        let request = LocationRequest::default();
        assert_eq!(request.interval, Duration::from_secs(5));
        assert_eq!(request.fastest_interval, Duration::from_secs(3));
        assert_eq!(request.smallest_displacement_m, 10.0);
        assert_eq!(request.priority, Priority::HighAccuracy);
    }

    #[test]
    fn test_zero_interval_request_is_invalid() {
        let request = LocationRequest {
            interval: Duration::ZERO,
            fastest_interval: Duration::ZERO,
            ..LocationRequest::default()
        };
        assert!(request.validate().is_err());

        // A zero fastest interval is fine as long as the interval is set
        let request = LocationRequest {
            fastest_interval: Duration::ZERO,
            ..LocationRequest::default()
        };
        assert!(request.validate().is_ok());
        assert!(LocationRequest::default().validate().is_ok());
    }

    #[test]
    fn test_fix_validity() {
        assert!(PositionFix::new(37.4219, -122.0840).is_valid());
        assert!(!PositionFix::new(91.0, 0.0).is_valid());
        assert!(!PositionFix::new(0.0, -181.0).is_valid());
        assert!(!PositionFix::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_distance_between_nearby_fixes() {
        let a = PositionFix::new(37.4219, -122.0840);
        let b = PositionFix::new(37.4220, -122.0840);
        let d = a.distance_to(&b);
        // 0.0001 degrees of latitude is roughly 11 meters
        assert!(d > 10.0 && d < 12.5, "unexpected distance {}", d);
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("FINE".parse::<PermissionStatus>(), Ok(PermissionStatus::Fine));
        assert_eq!("coarse".parse::<PermissionStatus>(), Ok(PermissionStatus::Coarse));
        assert_eq!("denied".parse::<PermissionStatus>(), Ok(PermissionStatus::Denied));
        assert!("maybe".parse::<PermissionStatus>().is_err());
        assert!(!PermissionStatus::Denied.is_granted());
        assert!(PermissionStatus::Coarse.is_granted());
    }
}
