// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication: current user identity and sign-in/sign-out events.

use crate::error::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// ID token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (auth user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Verified phone number, when signed in by phone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Stable unique user ID
    pub uid: String,
    pub phone_number: Option<String>,
}

/// Authentication service consumed by the client.
pub trait AuthProvider: Send + Sync {
    /// Currently signed-in user, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// Sign-in/sign-out events.
    fn watch(&self) -> watch::Receiver<Option<AuthUser>>;

    fn sign_out(&self);
}

/// Auth provider that signs users in from HS256 ID tokens.
pub struct IdTokenAuth {
    key: DecodingKey,
    state: watch::Sender<Option<AuthUser>>,
}

impl IdTokenAuth {
    pub fn new(signing_key: &[u8]) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            key: DecodingKey::from_secret(signing_key),
            state,
        }
    }

    /// Verify an ID token and make its subject the current user.
    pub fn sign_in(&self, token: &str) -> Result<AuthUser, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data =
            decode::<Claims>(token, &self.key, &validation).map_err(|_| AppError::InvalidToken)?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        let user = AuthUser {
            uid: token_data.claims.sub,
            phone_number: token_data.claims.phone_number,
        };
        tracing::info!(uid = %user.uid, "Signed in");
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }
}

impl AuthProvider for IdTokenAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }

    fn sign_out(&self) {
        if let Some(user) = self.state.send_replace(None) {
            tracing::info!(uid = %user.uid, "Signed out");
        }
    }
}

/// Create an ID token for a user (local development and tests).
pub fn create_id_token(
    uid: &str,
    phone_number: Option<&str>,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: uid.to_string(),
        iat: now,
        exp: now + 60 * 60, // 1 hour
        phone_number: phone_number.map(str::to_string),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_signing_key_32_bytes_min!!!";

    #[test]
    fn test_sign_in_sets_current_user() {
        let auth = IdTokenAuth::new(KEY);
        let mut events = auth.watch();
        assert!(auth.current_user().is_none());

        let token = create_id_token("driver-1", Some("+15550100"), KEY).unwrap();
        let user = auth.sign_in(&token).unwrap();
        assert_eq!(user.uid, "driver-1");
        assert_eq!(user.phone_number.as_deref(), Some("+15550100"));
        assert_eq!(auth.current_user(), Some(user));
        assert!(events.has_changed().unwrap());

        auth.sign_out();
        assert!(auth.current_user().is_none());
        assert!(events.borrow_and_update().is_none());
    }

    #[test]
    fn test_sign_in_rejects_foreign_signature() {
        let auth = IdTokenAuth::new(KEY);
        let token = create_id_token("driver-1", None, b"another_key_entirely_32_bytes!!!").unwrap();
        assert!(matches!(auth.sign_in(&token), Err(AppError::InvalidToken)));
        assert!(matches!(auth.sign_in("not-a-jwt"), Err(AppError::InvalidToken)));
        assert!(auth.current_user().is_none());
    }
}
