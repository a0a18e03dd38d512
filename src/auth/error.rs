use std::time::Duration;
use thiserror::Error;

use super::scope::Capability;

/// Failures raised by the user and token repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Everything that can go wrong while issuing or checking a token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never told apart.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing authorization header")]
    MissingAuthHeader,
    #[error("malformed authorization header")]
    MalformedAuthHeader,
    #[error("token not found")]
    TokenNotFound,
    #[error("token expired")]
    TokenExpired,
    #[error("insufficient scope: {0}")]
    InsufficientScope(Capability),
    #[error("requested scope '{0}' is invalid for user")]
    ScopeNotGranted(Capability),
    #[error("expiry extension {requested} is outside {min}..={max} minutes")]
    ExpiryOutOfRange { requested: i64, min: i64, max: i64 },
    #[error("{0}")]
    InvalidRequest(String),
    #[error("token lifetime {0} overflows the expiry timestamp")]
    LifetimeOverflow(chrono::TimeDelta),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("random source exhausted: {0}")]
    RandomSourceExhausted(#[source] rand::Error),
    #[error("password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl AuthError {
    /// True for failures that must not leak detail to the caller.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::RandomSourceExhausted(_)
                | Self::LifetimeOverflow(_)
                | Self::PasswordHash(_)
                | Self::Worker(_)
        )
    }
}
