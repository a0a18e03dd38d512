//! Bearer token gate.
//!
//! Each protected route group is wrapped with [`protect`] and its own required
//! scope. On success the resolved [`AuthenticatedUser`] is stored in the request
//! extensions, where only the extractor below reads it.

use axum::{
    Extension, Router,
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::AUTHORIZATION, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::ApiError;
use crate::auth::{AuthError, AuthState, AuthenticatedUser, Scope};

/// Wrap every route of `routes` with the gate for `required`.
pub fn protect(routes: Router, required: Scope) -> Router {
    routes.route_layer(middleware::from_fn_with_state(required, authenticate))
}

pub async fn authenticate(
    State(required): State<Scope>,
    Extension(auth): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = match request.headers().get(AUTHORIZATION).map(HeaderValue::to_str) {
        None => None,
        Some(Ok(value)) => Some(value.to_owned()),
        Some(Err(_)) => return ApiError::from(AuthError::MalformedAuthHeader).into_response(),
    };

    let principal = match auth
        .authenticator()
        .authorize(header.as_deref(), &required)
        .await
    {
        Ok(principal) => principal,
        Err(err) => return ApiError::from(err).into_response(),
    };

    tracing::Span::current().record("user_id", principal.user_id());
    request.extensions_mut().insert(principal);

    next.run(request).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(ApiError::MissingPrincipal)
    }
}
