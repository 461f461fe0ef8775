// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Driver presence: the client-side core of a ride-hailing driver app.
//!
//! This crate signs drivers in, loads or registers their profile, and keeps
//! their live location published to a geospatial index partitioned by city
//! while they are online.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::RealtimeStore;
use services::{
    AuthProvider, AuthSession, AvatarService, DriverSession, GeoFireIndex, Geocoder,
    LocationProvider, MapView, NoticeSink, ObjectStorage, ProfileStore, SessionService,
    SessionServices,
};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RealtimeStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub location: Arc<dyn LocationProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub storage: Arc<dyn ObjectStorage>,
    pub map: Arc<dyn MapView>,
    pub notices: Arc<dyn NoticeSink>,
}

impl AppState {
    pub fn sessions(&self) -> SessionService {
        SessionService::new(
            self.auth.clone(),
            self.profiles.clone(),
            self.notices.clone(),
        )
    }

    pub fn avatars(&self) -> AvatarService {
        AvatarService::new(
            self.storage.clone(),
            self.profiles.clone(),
            self.notices.clone(),
        )
    }

    /// Presence workflow for a signed-in driver, using the configured
    /// location cadence.
    pub fn driver_session(&self, driver: &AuthSession) -> DriverSession {
        let services = SessionServices {
            store: self.store.clone(),
            index: Arc::new(GeoFireIndex::new(self.store.clone())),
            location: self.location.clone(),
            geocoder: self.geocoder.clone(),
            auth: self.auth.clone(),
            map: self.map.clone(),
            notices: self.notices.clone(),
        };
        DriverSession::new(driver, services, self.config.location_request())
    }
}
