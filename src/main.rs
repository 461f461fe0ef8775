// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Headless driver agent.
//!
//! Signs a driver in, loads or registers their profile, then replays a
//! recorded track as the device location and keeps the driver's presence
//! published until interrupted.

use driver_presence::{
    config::{Config, ProfileBackend},
    db::{FirestoreDb, MemoryRealtimeStore, RealtimeStore},
    services::{
        create_id_token, AuthProvider, Bootstrap, BoundaryGeocoder, Geocoder, HeadlessMap,
        IdTokenAuth, MemoryObjectStorage, NominatimGeocoder, ProfileStore, RealtimeProfileStore,
        ReplayLocationProvider, TracingNoticeSink,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(project = %config.gcp_project_id, "Starting driver agent");

    // Realtime store (in-process; the client SDK owns the real connection)
    let store: Arc<dyn RealtimeStore> = Arc::new(MemoryRealtimeStore::new());

    // Sign in
    let auth = Arc::new(IdTokenAuth::new(&config.id_token_signing_key));
    let token = match &config.driver_id_token {
        Some(token) => token.clone(),
        None => {
            tracing::warn!("DRIVER_ID_TOKEN not set, signing in as local-driver");
            create_id_token(
                "local-driver",
                config.driver_phone_number.as_deref(),
                &config.id_token_signing_key,
            )?
        }
    };
    let user = auth.sign_in(&token)?;

    // Profile store
    let profiles: Arc<dyn ProfileStore> = match config.profile_backend {
        ProfileBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        ProfileBackend::Realtime => Arc::new(RealtimeProfileStore::new(store.clone())),
    };

    // Reverse geocoding
    let geocoder: Arc<dyn Geocoder> = match &config.nominatim_url {
        Some(url) => {
            tracing::info!(url = %url, "Using Nominatim reverse geocoding");
            Arc::new(NominatimGeocoder::new(url)?)
        }
        None => {
            tracing::info!(path = %config.place_boundaries_path, "Loading place boundaries");
            Arc::new(BoundaryGeocoder::load_from_file(&config.place_boundaries_path)?)
        }
    };

    // Device location
    let location = Arc::new(ReplayLocationProvider::load_from_file(
        &config.track_path,
        config.location_permission,
    )?);

    let state = AppState {
        config: config.clone(),
        store,
        auth: auth.clone(),
        profiles,
        location,
        geocoder,
        storage: Arc::new(MemoryObjectStorage::new(&config.storage_bucket)),
        map: Arc::new(HeadlessMap::new()),
        notices: Arc::new(TracingNoticeSink),
    };

    // Load or register the driver
    let sessions = state.sessions();
    let driver = match sessions.bootstrap(&user).await? {
        Bootstrap::Ready(driver) => driver,
        Bootstrap::NeedsRegistration { user, mut form } => {
            form.first_name = config.driver_first_name.clone().unwrap_or_default();
            form.last_name = config.driver_last_name.clone().unwrap_or_default();
            if let Some(phone) = &config.driver_phone_number {
                form.phone_number = phone.clone();
            }
            sessions.register(&user, &form).await?
        }
    };
    tracing::info!(driver_id = %driver.id(), "{}", driver.welcome_message());

    // Publish presence until interrupted
    let mut session = state.driver_session(&driver);
    session
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    if auth.current_user().is_some() {
        sessions.sign_out(driver);
    }
    tracing::info!("Driver agent stopped");
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("driver_presence=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
