// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, registration and avatar upload flows.

use driver_presence::db::RealtimeStore;
use driver_presence::models::{PermissionStatus, ProfileUpdate, RegistrationForm};
use driver_presence::services::{create_id_token, AuthProvider, Bootstrap};
use std::sync::Arc;

mod common;
use common::{bay_area_geocoder, create_test_app, TestApp, SIGNING_KEY};

fn app() -> TestApp {
    create_test_app(PermissionStatus::Fine, Arc::new(bay_area_geocoder()))
}

#[tokio::test]
async fn test_bootstrap_requires_sign_in() {
    let app = app();
    let err = app.state.sessions().bootstrap_current().await.unwrap_err();
    assert_eq!(err.kind(), "not_authenticated");
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = app();
    let token = create_id_token("d1", None, b"some_other_key_with_32_bytes!!!!").unwrap();
    let err = app.auth.sign_in(&token).unwrap_err();
    assert_eq!(err.kind(), "invalid_token");
    assert!(app.auth.current_user().is_none());
}

#[tokio::test]
async fn test_first_sign_in_registers_then_loads_profile() {
    let mut app = app();
    let token = create_id_token("d1", Some("+15550100"), SIGNING_KEY).unwrap();
    app.auth.sign_in(&token).unwrap();

    let sessions = app.state.sessions();
    let (user, mut form) = match sessions.bootstrap_current().await.unwrap() {
        Bootstrap::NeedsRegistration { user, form } => (user, form),
        Bootstrap::Ready(_) => panic!("profile should not exist yet"),
    };
    assert_eq!(form.phone_number, "+15550100");

    // Missing first name is reported and nothing is written
    let err = sessions.register(&user, &form).await.unwrap_err();
    assert_eq!(err.to_string(), "Please enter first name");
    assert!(!app.store.get("DriverInfo/d1").await.unwrap().exists());

    form.first_name = "Grace".to_string();
    form.last_name = "Hopper".to_string();
    let driver = sessions.register(&user, &form).await.unwrap();
    assert_eq!(driver.welcome_message(), "Welcome Grace Hopper");

    let stored = app.store.get("DriverInfo/d1").await.unwrap().value.unwrap();
    assert_eq!(stored["firstName"], "Grace");
    assert_eq!(stored["phoneNumber"], "+15550100");
    assert_eq!(stored["rating"], 0.0);

    let messages: Vec<String> = app.drain_notices().into_iter().map(|n| n.message).collect();
    assert_eq!(
        messages,
        vec![
            "Please enter first name".to_string(),
            "Register successfully".to_string()
        ]
    );

    match sessions.bootstrap(&user).await.unwrap() {
        Bootstrap::Ready(loaded) => assert_eq!(loaded.profile(), driver.profile()),
        Bootstrap::NeedsRegistration { .. } => panic!("profile should exist"),
    }
}

#[tokio::test]
async fn test_profile_edit_updates_session_copy() {
    let mut app = app();
    let mut driver = app.register_driver("d1").await;

    let update = ProfileUpdate {
        phone_number: Some("+15550199".to_string()),
        ..ProfileUpdate::default()
    };
    app.state
        .sessions()
        .update_profile(&mut driver, &update)
        .await
        .unwrap();

    assert_eq!(driver.profile().phone_number, "+15550199");
    assert_eq!(driver.profile().first_name, "Ada");
    let stored = app.store.get("DriverInfo/d1/phoneNumber").await.unwrap();
    assert_eq!(stored.value, Some(serde_json::json!("+15550199")));
}

#[tokio::test]
async fn test_avatar_upload_sets_profile_url() {
    let mut app = app();
    let mut driver = app.register_driver("d1").await;

    let url = app
        .state
        .avatars()
        .upload(&mut driver, vec![0x89, b'P', b'N', b'G'])
        .await
        .unwrap();

    assert!(url.contains("/o/avatars%2Fd1?alt=media"), "url: {}", url);
    assert_eq!(app.storage.object("avatars/d1").unwrap().len(), 4);
    assert_eq!(driver.profile().avatar.as_deref(), Some(url.as_str()));

    let stored = app.store.get("DriverInfo/d1/avatar").await.unwrap();
    assert_eq!(stored.value, Some(serde_json::Value::String(url)));
}

#[tokio::test]
async fn test_empty_avatar_is_rejected() {
    let mut app = app();
    let mut driver = app.register_driver("d1").await;

    let err = app
        .state
        .avatars()
        .upload(&mut driver, Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(driver.profile().avatar.is_none());
    assert!(app.storage.object("avatars/d1").is_none());
    assert!(app.drain_notices()[0].is_error());
}

#[tokio::test]
async fn test_sign_out_clears_current_user() {
    let mut app = app();
    let driver = app.register_driver("d1").await;
    let mut watch = app.auth.watch();

    app.state.sessions().sign_out(driver);
    watch.changed().await.unwrap();
    assert!(watch.borrow().is_none());
    assert!(app.auth.current_user().is_none());
}

#[tokio::test]
async fn test_registration_form_trims_input() {
    let mut app = app();
    let token = create_id_token("d2", None, SIGNING_KEY).unwrap();
    let user = app.auth.sign_in(&token).unwrap();

    let form = RegistrationForm {
        first_name: "  Ada ".to_string(),
        last_name: " Lovelace".to_string(),
        phone_number: "+15550100 ".to_string(),
    };
    let driver = app.state.sessions().register(&user, &form).await.unwrap();
    assert_eq!(driver.profile().first_name, "Ada");
    assert_eq!(driver.profile().phone_number, "+15550100");
    assert_eq!(app.drain_notices().len(), 1);
}
