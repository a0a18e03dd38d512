//! Token issuance and logout.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ApiError, MessageResponse};
use crate::auth::{AuthState, AuthenticatedUser, IssueRequest, Scope};

#[derive(Deserialize, ToSchema)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
    /// Capabilities requested for the token; must be held by the user.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Minutes added to the two hour base lifetime, between -55 and 1380.
    #[serde(default)]
    pub expiry: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthenticationToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
    #[schema(value_type = Vec<String>)]
    pub scope: Scope,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub error: bool,
    pub message: String,
    pub authentication_token: AuthenticationToken,
}

#[utoipa::path(
    post,
    path = "/api/authenticate",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued; any earlier token of the user is revoked.", body = TokenResponse),
        (status = 400, description = "Malformed body, scope or expiry.", body = MessageResponse),
        (status = 401, description = "Invalid credentials.", body = MessageResponse),
    ),
    tag = "auth"
)]
pub async fn authenticate(
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Json(request) = payload?;

    let (user, issued) = auth
        .authenticator()
        .issue(IssueRequest {
            email: request.email,
            password: SecretString::from(request.password),
            scope: request.scope,
            expiry_minutes: request.expiry,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            error: false,
            message: format!("token for {} created", user.email),
            authentication_token: AuthenticationToken {
                token: issued.plaintext().to_string(),
                expiry: issued.token().expiry,
                scope: issued.token().scope.clone(),
            },
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Every token of the caller is revoked.", body = MessageResponse),
        (status = 401, description = "Missing, invalid or expired token.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    auth: Extension<Arc<AuthState>>,
    principal: AuthenticatedUser,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    auth.authenticator().revoke(principal.user_id()).await?;
    Ok((StatusCode::OK, Json(MessageResponse::ok("logged out"))))
}
