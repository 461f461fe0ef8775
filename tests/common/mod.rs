// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use driver_presence::config::Config;
use driver_presence::db::{FirestoreDb, MemoryRealtimeStore, RealtimeStore};
use driver_presence::models::{PermissionStatus, RegistrationForm};
use driver_presence::services::{
    create_id_token, AuthSession, BoundaryGeocoder, ChannelNoticeSink, Geocoder, HeadlessMap,
    IdTokenAuth, MemoryObjectStorage, Notice, PlaceError, PushLocationProvider,
    RealtimeProfileStore,
};
use driver_presence::AppState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Key shared by the test auth provider and token minting.
#[allow(dead_code)]
pub const SIGNING_KEY: &[u8] = b"test_id_token_key_32_bytes_min!!";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Boundaries for Mountain View and Palo Alto.
#[allow(dead_code)]
pub fn bay_area_geocoder() -> BoundaryGeocoder {
    BoundaryGeocoder::load_from_file("data/bay_area_places.geojson")
        .expect("Failed to load place boundaries")
}

/// Geocoder that sleeps before each lookup. Delays are consumed in call
/// order; calls past the end of the list are not delayed.
#[allow(dead_code)]
pub struct DelayedGeocoder {
    inner: BoundaryGeocoder,
    delays: Mutex<VecDeque<Duration>>,
}

#[allow(dead_code)]
impl DelayedGeocoder {
    pub fn new(delays: &[Duration]) -> Self {
        Self {
            inner: bay_area_geocoder(),
            delays: Mutex::new(delays.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl Geocoder for DelayedGeocoder {
    async fn locality(&self, latitude: f64, longitude: f64) -> Result<Option<String>, PlaceError> {
        let delay = self.delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.locality(latitude, longitude).await
    }
}

/// Application wired to in-process fakes, plus handles to drive them.
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub store: MemoryRealtimeStore,
    pub location: PushLocationProvider,
    pub map: HeadlessMap,
    pub storage: MemoryObjectStorage,
    pub auth: Arc<IdTokenAuth>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

#[allow(dead_code)]
impl TestApp {
    /// Every notice delivered so far.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// Sign in and register `uid`, returning the driver's session.
    pub async fn register_driver(&mut self, uid: &str) -> AuthSession {
        let token = create_id_token(uid, Some("+15550100"), SIGNING_KEY).unwrap();
        let user = self.auth.sign_in(&token).unwrap();
        let form = RegistrationForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone_number: "+15550100".to_string(),
        };
        let driver = self.state.sessions().register(&user, &form).await.unwrap();
        self.drain_notices();
        driver
    }
}

/// Create a test app with offline in-process dependencies.
#[allow(dead_code)]
pub fn create_test_app(permission: PermissionStatus, geocoder: Arc<dyn Geocoder>) -> TestApp {
    let config = Config::test_default();
    let store = MemoryRealtimeStore::new();
    let shared: Arc<dyn RealtimeStore> = Arc::new(store.clone());
    let location = PushLocationProvider::new(permission);
    let map = HeadlessMap::new();
    let storage = MemoryObjectStorage::new(&config.storage_bucket);
    let auth = Arc::new(IdTokenAuth::new(SIGNING_KEY));
    let (sink, notices) = ChannelNoticeSink::new();

    let state = AppState {
        config,
        store: shared.clone(),
        auth: auth.clone(),
        profiles: Arc::new(RealtimeProfileStore::new(shared)),
        location: Arc::new(location.clone()),
        geocoder,
        storage: Arc::new(storage.clone()),
        map: Arc::new(map.clone()),
        notices: Arc::new(sink),
    };

    TestApp {
        state,
        store,
        location,
        map,
        storage,
        auth,
        notices,
    }
}
