// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reverse geocoding: coordinates to a coarse locality name.

use crate::error::AppError;
use crate::models::place::{Place, PlaceGeometry};
use crate::models::{PlaceKey, PositionFix};
use async_trait::async_trait;
use geo::{MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Reverse geocoding provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// First locality name for the coordinate, `None` if nothing matches.
    async fn locality(&self, latitude: f64, longitude: f64) -> Result<Option<String>, PlaceError>;
}

/// Resolves fixes to place partition keys.
#[derive(Clone)]
pub struct PlaceResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl PlaceResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Resolve a fix, failing with `AppError::Resolution` when the geocoder
    /// errors or finds no locality.
    pub async fn resolve(&self, fix: &PositionFix) -> Result<PlaceKey, AppError> {
        let name = self
            .geocoder
            .locality(fix.latitude, fix.longitude)
            .await
            .map_err(|e| AppError::Resolution(e.to_string()))?;

        name.as_deref()
            .and_then(PlaceKey::new)
            .ok_or_else(|| {
                AppError::Resolution(format!(
                    "No locality found for ({:.5}, {:.5})",
                    fix.latitude, fix.longitude
                ))
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BoundaryGeocoder - point-in-polygon over locality boundaries
// ─────────────────────────────────────────────────────────────────────────────

/// Geocoder backed by locality boundaries loaded from GeoJSON.
#[derive(Default, Clone)]
pub struct BoundaryGeocoder {
    places: Vec<Place>,
}

impl BoundaryGeocoder {
    /// Load boundaries from a GeoJSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PlaceError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| PlaceError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load boundaries from a GeoJSON FeatureCollection string.
    ///
    /// Each feature needs a `name` property and a Polygon or MultiPolygon
    /// geometry; unnamed features are skipped.
    pub fn load_from_json(json_data: &str) -> Result<Self, PlaceError> {
        let geojson: GeoJson = json_data
            .parse()
            .map_err(|e: geojson::Error| PlaceError::ParseError(e.to_string()))?;

        let mut places = Vec::new();

        if let GeoJson::FeatureCollection(collection) = geojson {
            for feature in collection.features {
                let name = feature
                    .property("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .trim()
                    .to_string();

                if name.is_empty() {
                    continue;
                }

                if let Some(geom) = feature.geometry {
                    let geometry = Self::convert_geometry(geom.value)?;
                    places.push(Place { name, geometry });
                }
            }
        }

        tracing::info!(count = places.len(), "Loaded place boundaries");
        Ok(Self { places })
    }

    /// Convert GeoJSON geometry to our internal format.
    fn convert_geometry(value: geojson::Value) -> Result<PlaceGeometry, PlaceError> {
        use std::convert::TryInto;

        let poly_result: Result<Polygon<f64>, _> = value.clone().try_into();
        if let Ok(poly) = poly_result {
            return Ok(PlaceGeometry::Polygon(poly));
        }

        let multi_result: Result<MultiPolygon<f64>, _> = value.try_into();
        if let Ok(multi) = multi_result {
            return Ok(PlaceGeometry::MultiPolygon(multi));
        }

        Err(PlaceError::UnsupportedGeometry)
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// Name of the first place containing the point.
    pub fn find_locality(&self, point: &Point<f64>) -> Option<&str> {
        self.places
            .iter()
            .find(|p| p.geometry.contains(point))
            .map(|p| p.name.as_str())
    }
}

#[async_trait]
impl Geocoder for BoundaryGeocoder {
    async fn locality(&self, latitude: f64, longitude: f64) -> Result<Option<String>, PlaceError> {
        let point = Point::new(longitude, latitude);
        Ok(self.find_locality(&point).map(str::to_string))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NominatimGeocoder - HTTP reverse geocoding
// ─────────────────────────────────────────────────────────────────────────────

/// Geocoder backed by a Nominatim-compatible reverse geocoding endpoint.
#[derive(Clone)]
pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
}

/// Subset of the reverse geocoding response we use.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl ReverseAddress {
    fn locality(self) -> Option<String> {
        self.city.or(self.town).or(self.village)
    }
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Result<Self, PlaceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("driver-presence/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PlaceError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn locality(&self, latitude: f64, longitude: f64) -> Result<Option<String>, PlaceError> {
        let url = format!("{}/reverse", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PlaceError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(PlaceError::Http(format!("HTTP {}", status)));
        }

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| PlaceError::ParseError(e.to_string()))?;

        if let Some(error) = body.error {
            tracing::debug!(latitude, longitude, error = %error, "No reverse geocoding match");
            return Ok(None);
        }

        Ok(body.address.and_then(ReverseAddress::locality))
    }
}

/// Errors from place operations.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Unsupported geometry type (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry,

    #[error("Geocoding service unavailable: {0}")]
    Http(String),
}
