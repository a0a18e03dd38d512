//! Route handlers and the shared error response.
//!
//! Every failure renders as `{ "error": true, "message": ... }`. Token and
//! credential failures collapse into a single `unauthorized` message; internal
//! failures are logged here and never described to the client.

pub mod authenticate;
pub mod gate;
pub mod health;
pub mod hello;
pub mod users;


use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::auth::AuthError;

const UNAUTHORIZED: &str = "unauthorized";
const INTERNAL: &str = "something went wrong";

/// Envelope shared by every non-list response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub error: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    BadRequest(String),
    NotFound(&'static str),
    Conflict(&'static str),
    /// A handler that needs a principal ran without the gate in front of it.
    MissingPrincipal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, (*message).to_string()),
            Self::Conflict(message) => (StatusCode::CONFLICT, (*message).to_string()),
            Self::MissingPrincipal => {
                error!("Handler reached without an authenticated principal");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
            Self::Auth(err) => match err {
                AuthError::InvalidRequest(_)
                | AuthError::ExpiryOutOfRange { .. }
                | AuthError::ScopeNotGranted(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                AuthError::MissingAuthHeader
                | AuthError::MalformedAuthHeader
                | AuthError::TokenNotFound
                | AuthError::TokenExpired
                | AuthError::InvalidCredentials => {
                    debug!("Rejecting request: {err}");
                    (StatusCode::UNAUTHORIZED, UNAUTHORIZED.to_string())
                }
                AuthError::InsufficientScope(_) => (StatusCode::UNAUTHORIZED, err.to_string()),
                AuthError::StoreUnavailable(_)
                | AuthError::RandomSourceExhausted(_)
                | AuthError::LifetimeOverflow(_)
                | AuthError::PasswordHash(_)
                | AuthError::Worker(_) => {
                    error!("Request failed: {err}");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(MessageResponse::failure(message))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use crate::auth::{Capability, StoreError};
    use std::time::Duration;

    fn mapped(err: AuthError) -> (StatusCode, String) {
        ApiError::from(err).status_and_message()
    }

    #[test]
    fn token_failures_share_one_message() {
        for err in [
            AuthError::MissingAuthHeader,
            AuthError::MalformedAuthHeader,
            AuthError::TokenNotFound,
            AuthError::TokenExpired,
            AuthError::InvalidCredentials,
        ] {
            assert_eq!(mapped(err), (StatusCode::UNAUTHORIZED, UNAUTHORIZED.to_string()));
        }
    }

    #[test]
    fn scope_failures_name_the_capability() {
        assert_eq!(
            mapped(AuthError::InsufficientScope(Capability::WriteA)),
            (StatusCode::UNAUTHORIZED, "insufficient scope: write:a".to_string())
        );
        assert_eq!(
            mapped(AuthError::ScopeNotGranted(Capability::ReadB)),
            (
                StatusCode::BAD_REQUEST,
                "requested scope 'read:b' is invalid for user".to_string()
            )
        );
    }

    #[test]
    fn internal_failures_are_generic() {
        let (status, message) = mapped(AuthError::StoreUnavailable(StoreError::Timeout(
            Duration::from_secs(3),
        )));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, INTERNAL);
    }
}
