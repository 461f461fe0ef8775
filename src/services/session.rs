// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed-in driver session: profile bootstrap, registration and sign-out.

use crate::error::{AppError, Result};
use crate::models::{DriverProfile, ProfileUpdate, RegistrationForm};
use crate::services::{AuthProvider, AuthUser, Notice, NoticeSink, ProfileStore};
use std::sync::Arc;

/// The signed-in driver and their profile.
///
/// Lives from sign-in (or registration) until sign-out; the caller owns it and
/// passes it to whatever needs the driver's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    user: AuthUser,
    profile: DriverProfile,
}

impl AuthSession {
    pub fn new(user: AuthUser, profile: DriverProfile) -> Self {
        Self { user, profile }
    }

    /// Driver ID (the auth user ID).
    pub fn id(&self) -> &str {
        &self.user.uid
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    pub fn welcome_message(&self) -> String {
        format!("Welcome {}", self.profile.display_name())
    }

    pub(crate) fn replace_profile(&mut self, profile: DriverProfile) {
        self.profile = profile;
    }
}

/// Outcome of loading the driver after sign-in.
#[derive(Debug, Clone, PartialEq)]
pub enum Bootstrap {
    /// A profile exists; the session is ready.
    Ready(AuthSession),
    /// First sign-in: the driver must register.
    NeedsRegistration {
        user: AuthUser,
        form: RegistrationForm,
    },
}

/// Loads, registers and signs out drivers.
#[derive(Clone)]
pub struct SessionService {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    notices: Arc<dyn NoticeSink>,
}

impl SessionService {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            auth,
            profiles,
            notices,
        }
    }

    /// Bootstrap the currently signed-in user.
    pub async fn bootstrap_current(&self) -> Result<Bootstrap> {
        let user = self.auth.current_user().ok_or(AppError::NotAuthenticated)?;
        self.bootstrap(&user).await
    }

    /// Load the driver's profile, or ask for registration if there is none.
    pub async fn bootstrap(&self, user: &AuthUser) -> Result<Bootstrap> {
        match self.profiles.get_profile(&user.uid).await {
            Ok(Some(profile)) => {
                tracing::info!(driver_id = %user.uid, "Loaded driver profile");
                Ok(Bootstrap::Ready(AuthSession::new(user.clone(), profile)))
            }
            Ok(None) => {
                tracing::info!(driver_id = %user.uid, "No driver profile, registration required");
                Ok(Bootstrap::NeedsRegistration {
                    user: user.clone(),
                    form: RegistrationForm::prefilled(user.phone_number.as_deref()),
                })
            }
            Err(e) => {
                self.notices.report(&e);
                Err(e)
            }
        }
    }

    /// Validate the form and create the driver's profile.
    pub async fn register(&self, user: &AuthUser, form: &RegistrationForm) -> Result<AuthSession> {
        let form = match form.check() {
            Ok(form) => form,
            Err(message) => {
                let err = AppError::Validation(message);
                self.notices.report(&err);
                return Err(err);
            }
        };

        let profile = form.into_profile(&user.uid);
        if let Err(e) = self.profiles.put_profile(&profile).await {
            self.notices.report(&e);
            return Err(e);
        }

        tracing::info!(driver_id = %user.uid, "Registered driver");
        self.notices
            .notify(Notice::info("registered", "Register successfully"));
        Ok(AuthSession::new(user.clone(), profile))
    }

    /// Persist a profile edit and refresh the session's copy.
    pub async fn update_profile(
        &self,
        session: &mut AuthSession,
        update: &ProfileUpdate,
    ) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        match self.profiles.update_profile(session.id(), update).await {
            Ok(profile) => {
                session.replace_profile(profile);
                Ok(())
            }
            Err(e) => {
                self.notices.report(&e);
                Err(e)
            }
        }
    }

    /// Sign out. The session is consumed.
    pub fn sign_out(&self, session: AuthSession) {
        tracing::info!(driver_id = %session.id(), "Driver signing out");
        self.auth.sign_out();
    }
}
