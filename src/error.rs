// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by every workflow step.
//!
//! Failures are never fatal to the process. Each one is reported once through
//! a [`NoticeSink`](crate::services::NoticeSink) and mapped to a stable
//! short code via [`AppError::kind`].

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Location permission is required")]
    PermissionDenied,

    #[error("Could not resolve place: {0}")]
    Resolution(String),

    #[error("Failed to publish location: {0}")]
    Publish(String),

    #[error("Subscription cancelled: {0}")]
    Subscription(String),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable code for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::PermissionDenied => "permission_denied",
            AppError::Resolution(_) => "resolution_failure",
            AppError::Publish(_) => "publish_failure",
            AppError::Subscription(_) => "subscription_failure",
            AppError::NotAuthenticated => "not_authenticated",
            AppError::InvalidToken => "invalid_token",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database_error",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error belongs to the presence workflow itself (as opposed
    /// to account or storage plumbing).
    pub fn is_workflow_error(&self) -> bool {
        matches!(
            self,
            AppError::PermissionDenied
                | AppError::Resolution(_)
                | AppError::Publish(_)
                | AppError::Subscription(_)
        )
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
