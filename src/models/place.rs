// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Locality boundary model and geometry handling.

use geo::{MultiPolygon, Point, Polygon};

/// A named locality (city, town) with its boundary geometry.
#[derive(Debug, Clone)]
pub struct Place {
    /// Locality name (e.g., "Mountain View")
    pub name: String,
    /// Boundary geometry (can be Polygon or MultiPolygon)
    pub geometry: PlaceGeometry,
}

/// Place geometry - either a simple polygon or multi-polygon.
#[derive(Debug, Clone)]
pub enum PlaceGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl PlaceGeometry {
    /// Check if a point lies inside this geometry.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        use geo::Contains;
        match self {
            PlaceGeometry::Polygon(p) => p.contains(point),
            PlaceGeometry::MultiPolygon(mp) => mp.contains(point),
        }
    }
}
