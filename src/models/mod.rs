// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod driver;
pub mod location;
pub mod place;
pub mod presence;

pub use driver::{DriverProfile, ProfileUpdate, RegistrationForm};
pub use location::{LocationRequest, PermissionStatus, PositionFix, Priority};
pub use place::{Place, PlaceGeometry};
pub use presence::{GeoFireRecord, PlaceKey, PresenceEntry};
