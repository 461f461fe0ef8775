//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first if present.

use crate::models::{LocationRequest, PermissionStatus, Priority};
use std::env;
use std::time::Duration;

/// Where driver profiles are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileBackend {
    /// `DriverInfo` collection in Firestore
    Firestore,
    /// `DriverInfo/<id>` in the realtime store
    Realtime,
}

impl std::str::FromStr for ProfileBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(ProfileBackend::Firestore),
            "realtime" => Ok(ProfileBackend::Realtime),
            other => Err(format!("unknown profile backend: {}", other)),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    pub profile_backend: ProfileBackend,
    /// Bucket used for avatar download URLs
    pub storage_bucket: String,

    /// HS256 key for ID tokens (raw bytes)
    pub id_token_signing_key: Vec<u8>,
    /// ID token to sign in with at startup
    pub driver_id_token: Option<String>,

    // --- Location stream ---
    pub location_interval: Duration,
    pub location_fastest_interval: Duration,
    pub location_min_displacement_m: f64,
    /// Permission the headless agent reports for the device
    pub location_permission: PermissionStatus,
    /// Recorded track replayed as the device location
    pub track_path: String,

    // --- Reverse geocoding ---
    /// Locality boundaries (GeoJSON), used unless a Nominatim URL is set
    pub place_boundaries_path: String,
    pub nominatim_url: Option<String>,

    // --- Registration on first sign-in ---
    pub driver_first_name: Option<String>,
    pub driver_last_name: Option<String>,
    pub driver_phone_number: Option<String>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            profile_backend: ProfileBackend::Realtime,
            storage_bucket: "test-project.appspot.com".to_string(),
            id_token_signing_key: b"test_id_token_key_32_bytes_min!!".to_vec(),
            driver_id_token: None,
            location_interval: Duration::from_millis(5000),
            location_fastest_interval: Duration::from_millis(3000),
            location_min_displacement_m: 10.0,
            location_permission: PermissionStatus::Fine,
            track_path: "data/sample_track.geojson".to_string(),
            place_boundaries_path: "data/bay_area_places.geojson".to_string(),
            nominatim_url: None,
            driver_first_name: None,
            driver_last_name: None,
            driver_phone_number: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            profile_backend: parse_var("PROFILE_BACKEND", ProfileBackend::Realtime)?,
            storage_bucket: env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| "local-dev.appspot.com".to_string()),

            id_token_signing_key: env::var("ID_TOKEN_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("ID_TOKEN_SIGNING_KEY"))?
                .into_bytes(),
            driver_id_token: optional_var("DRIVER_ID_TOKEN"),

            location_interval: parse_interval("LOCATION_INTERVAL_MS", 5000)?,
            location_fastest_interval: parse_interval("LOCATION_FASTEST_INTERVAL_MS", 3000)?,
            location_min_displacement_m: parse_var("LOCATION_MIN_DISPLACEMENT_M", 10.0)?,
            location_permission: parse_var("LOCATION_PERMISSION", PermissionStatus::Fine)?,
            track_path: env::var("DRIVER_TRACK_PATH")
                .unwrap_or_else(|_| "data/sample_track.geojson".to_string()),

            place_boundaries_path: env::var("PLACE_BOUNDARIES_PATH")
                .unwrap_or_else(|_| "data/bay_area_places.geojson".to_string()),
            nominatim_url: optional_var("NOMINATIM_URL"),

            driver_first_name: optional_var("DRIVER_FIRST_NAME"),
            driver_last_name: optional_var("DRIVER_LAST_NAME"),
            driver_phone_number: optional_var("DRIVER_PHONE_NUMBER"),
        })
    }

    /// Location request built from the configured cadence.
    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            interval: self.location_interval,
            fastest_interval: self.location_fastest_interval,
            smallest_displacement_m: self.location_min_displacement_m,
            priority: Priority::HighAccuracy,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        None => Ok(default),
    }
}

/// Millisecond interval; zero is rejected.
fn parse_interval(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    match parse_var(name, default_ms)? {
        0 => Err(ConfigError::Invalid(name, "must be greater than zero".to_string())),
        ms => Ok(Duration::from_millis(ms)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
