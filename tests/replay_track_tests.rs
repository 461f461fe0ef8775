// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for replaying a recorded track through a driver session.
//!
//! Uses the sample track and real place boundaries under `data/`.

use driver_presence::config::Config;
use driver_presence::db::{MemoryRealtimeStore, RealtimeStore};
use driver_presence::models::{LocationRequest, PermissionStatus, RegistrationForm};
use driver_presence::services::{
    create_id_token, AuthSession, AuthUser, ChannelNoticeSink, DriverSession, GeoFireIndex,
    HeadlessMap, IdTokenAuth, LocationProvider, ReplayLocationProvider, SessionEvent,
    SessionServices, SessionState,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{bay_area_geocoder, SIGNING_KEY};

fn driver() -> AuthSession {
    let profile = RegistrationForm {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone_number: "+15550100".to_string(),
    }
    .into_profile("d1");
    AuthSession::new(
        AuthUser {
            uid: "d1".to_string(),
            phone_number: None,
        },
        profile,
    )
}

fn fast_request() -> LocationRequest {
    LocationRequest {
        interval: Duration::from_millis(5),
        fastest_interval: Duration::from_millis(1),
        ..LocationRequest::default()
    }
}

#[tokio::test]
async fn test_sample_track_ends_in_mountain_view() {
    let track_path = Config::test_default().track_path;
    if !Path::new(&track_path).exists() {
        println!("⚠️  Skipping test: track not found at {:?}", track_path);
        return;
    }

    let location =
        Arc::new(ReplayLocationProvider::load_from_file(&track_path, PermissionStatus::Fine).unwrap());
    let points = location.track().0.len();

    let store = MemoryRealtimeStore::new();
    let shared: Arc<dyn RealtimeStore> = Arc::new(store.clone());
    let (sink, mut notices) = ChannelNoticeSink::new();
    let auth = Arc::new(IdTokenAuth::new(SIGNING_KEY));
    auth.sign_in(&create_id_token("d1", None, SIGNING_KEY).unwrap())
        .unwrap();

    let services = SessionServices {
        store: shared.clone(),
        index: Arc::new(GeoFireIndex::new(shared)),
        location: location.clone(),
        geocoder: Arc::new(bay_area_geocoder()),
        auth,
        map: Arc::new(HeadlessMap::new()),
        notices: Arc::new(sink),
    };
    let mut session = DriverSession::new(&driver(), services, fast_request());
    session.start().await.unwrap();

    // Drive the session until every track point has been applied
    let mut fixes = 0;
    while fixes < points {
        let event = tokio::time::timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("replay stalled")
            .expect("session stopped");
        if matches!(event, SessionEvent::Fix(_)) {
            fixes += 1;
        }
        session.handle(event).await;
    }
    session.settle().await;

    assert_eq!(session.current_place().unwrap().as_str(), "Mountain View");
    assert!(store.get("DriversLocation/Mountain View/d1").await.unwrap().exists());
    assert!(!store.get("DriversLocation/Palo Alto").await.unwrap().exists());
    assert_eq!(
        store.pending_disconnects(),
        vec!["DriversLocation/Mountain View/d1".to_string()]
    );

    let mut online = 0;
    while let Ok(notice) = notices.try_recv() {
        assert!(!notice.is_error(), "unexpected notice {:?}", notice);
        online += 1;
    }
    assert_eq!(online, points);

    let last = location.last_location().await.unwrap().unwrap();
    assert_eq!((last.latitude, last.longitude), (37.3970, -122.0840));

    session.teardown().await;
    assert_eq!(session.state(), SessionState::TornDown);
    assert!(!store.get("DriversLocation").await.unwrap().exists());
    assert_eq!(location.active_players(), 0);
}

#[tokio::test]
async fn test_polyline_track_respects_displacement() {
    // Two points about 1 m apart, then one far away
    let line = geo::LineString::from(vec![
        (-122.08400, 37.42190),
        (-122.08400, 37.42191),
        (-122.07400, 37.42190),
    ]);
    let encoded = polyline::encode_coordinates(line, 5).unwrap();

    let location = ReplayLocationProvider::from_polyline(&encoded, PermissionStatus::Fine).unwrap();
    assert_eq!(location.track().0.len(), 3);

    let mut registration = location.request_updates(&fast_request()).await.unwrap();
    let first = registration.next().await.unwrap();
    let second = registration.next().await.unwrap();
    assert!((first.longitude + 122.084).abs() < 1e-9);
    assert!((second.longitude + 122.074).abs() < 1e-9);

    location.remove_updates(registration).await;
}

#[tokio::test]
async fn test_replay_refuses_without_permission() {
    let location = ReplayLocationProvider::new(
        geo::LineString::from(vec![(-122.084, 37.4219)]),
        PermissionStatus::Denied,
    );
    let err = location.request_updates(&fast_request()).await.unwrap_err();
    assert_eq!(err.kind(), "permission_denied");
    assert_eq!(location.active_players(), 0);
}
