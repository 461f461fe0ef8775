// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests for the driver profile store.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set). The emulator provides a clean state for
//! each test run.

use driver_presence::models::{DriverProfile, ProfileUpdate, RegistrationForm};
use driver_presence::services::ProfileStore;

mod common;
use common::test_db;

/// Generate a unique driver ID for test isolation.
fn unique_driver_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("driver-{}", nanos)
}

/// Helper to create a basic test profile
fn test_profile(driver_id: &str) -> DriverProfile {
    RegistrationForm {
        first_name: "Test".to_string(),
        last_name: "Driver".to_string(),
        phone_number: "+15550100".to_string(),
    }
    .into_profile(driver_id)
}

#[tokio::test]
async fn test_new_profile_creation() {
    require_emulator!();

    let db = test_db().await;
    let driver_id = unique_driver_id();

    // Initially, profile should not exist
    let before = db.get_profile(&driver_id).await.unwrap();
    assert!(before.is_none(), "Profile should not exist before creation");

    db.put_profile(&test_profile(&driver_id)).await.unwrap();

    let fetched = db
        .get_profile(&driver_id)
        .await
        .unwrap()
        .expect("Profile should exist after creation");
    assert_eq!(fetched.id, driver_id);
    assert_eq!(fetched.first_name, "Test");
    assert_eq!(fetched.last_name, "Driver");
    assert_eq!(fetched.rating, 0.0);
    assert!(fetched.avatar.is_none());
}

#[tokio::test]
async fn test_profile_update_preserves_other_fields() {
    require_emulator!();

    let db = test_db().await;
    let driver_id = unique_driver_id();
    db.put_profile(&test_profile(&driver_id)).await.unwrap();

    let updated = db
        .update_profile(&driver_id, &ProfileUpdate::avatar("https://example.com/a.png"))
        .await
        .unwrap();
    assert_eq!(updated.avatar.as_deref(), Some("https://example.com/a.png"));

    let fetched = db.get_profile(&driver_id).await.unwrap().unwrap();
    assert_eq!(fetched, updated);
    assert_eq!(fetched.phone_number, "+15550100");
}

#[tokio::test]
async fn test_update_missing_profile_fails() {
    require_emulator!();

    let db = test_db().await;
    let err = db
        .update_profile(&unique_driver_id(), &ProfileUpdate::avatar("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "database_error");
}

#[tokio::test]
async fn test_offline_client_reports_database_error() {
    let db = driver_presence::db::FirestoreDb::new_mock();
    let err = db.get_profile("anyone").await.unwrap_err();
    assert_eq!(err.kind(), "database_error");
}
