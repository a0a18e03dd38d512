//! User management endpoints under `/api/admin/users`.
//!
//! Flow Overview:
//! 1) The gate has already required every capability of the vocabulary.
//! 2) Validate the path id and body, normalizing emails before they are stored.
//! 3) Hash new passwords, persist, and map store outcomes to 404/409.
//!
//! Password hashes never leave this module.

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{ApiError, MessageResponse};
use crate::auth::{
    AuthState, NewUser, Scope, User, UserChanges, WriteOutcome,
    models::{normalize_email, valid_email},
};

const USER_NOT_FOUND: &str = "user not found";
const EMAIL_TAKEN: &str = "email already registered";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[schema(value_type = Vec<String>)]
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            scope: user.scope,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    /// Defaults to every capability when omitted.
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Left unchanged when omitted or empty.
    #[serde(default)]
    pub password: Option<String>,
    /// Left unchanged when omitted.
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

fn parse_user_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest("invalid user id".to_string())),
    }
}

fn required_name(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn checked_email(value: &str) -> Result<String, ApiError> {
    let email = normalize_email(value);
    if valid_email(&email) {
        Ok(email)
    } else {
        Err(ApiError::BadRequest("invalid email address".to_string()))
    }
}

fn parse_scope(names: &[String]) -> Result<Scope, ApiError> {
    Scope::parse_list(names).map_err(|err| ApiError::BadRequest(err.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "Users ordered by last then first name.", body = [UserResponse]),
        (status = 401, description = "Missing token or insufficient scope.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    auth: Extension<Arc<AuthState>>,
) -> Result<(StatusCode, Json<Vec<UserResponse>>), ApiError> {
    let users = auth.authenticator().users().list().await?;
    Ok((
        StatusCode::OK,
        Json(users.into_iter().map(UserResponse::from).collect()),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user.", body = UserResponse),
        (status = 400, description = "Invalid id.", body = MessageResponse),
        (status = 404, description = "No such user.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    auth: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let id = parse_user_id(&id)?;
    let user = auth
        .authenticator()
        .users()
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound(USER_NOT_FOUND))?;
    Ok((StatusCode::OK, Json(user.into())))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created.", body = UserResponse),
        (status = 400, description = "Invalid body.", body = MessageResponse),
        (status = 409, description = "Email already registered.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(request) = payload?;

    let first_name = required_name(&request.first_name, "first_name")?;
    let last_name = required_name(&request.last_name, "last_name")?;
    let email = checked_email(&request.email)?;
    if request.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    let scope = match request.scope.as_deref() {
        Some(names) => parse_scope(names)?,
        None => Scope::all(),
    };

    let authenticator = auth.authenticator();
    let password_hash = authenticator
        .hasher()
        .hash(&SecretString::from(request.password))
        .await?;

    let new_user = NewUser {
        first_name,
        last_name,
        email,
        password_hash,
        scope,
    };
    match authenticator.users().insert(&new_user).await? {
        WriteOutcome::Written(user) => {
            info!(user_id = user.id, "user created");
            Ok((StatusCode::CREATED, Json(user.into())))
        }
        WriteOutcome::Conflict => Err(ApiError::Conflict(EMAIL_TAKEN)),
        WriteOutcome::NotFound => Err(ApiError::NotFound(USER_NOT_FOUND)),
    }
}

/// Replaces names and email; password and scope only when supplied.
///
/// Changing the password or scope revokes the user's token.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated.", body = UserResponse),
        (status = 400, description = "Invalid id or body.", body = MessageResponse),
        (status = 404, description = "No such user.", body = MessageResponse),
        (status = 409, description = "Email already registered.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    auth: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let id = parse_user_id(&id)?;
    let Json(request) = payload?;

    let first_name = required_name(&request.first_name, "first_name")?;
    let last_name = required_name(&request.last_name, "last_name")?;
    let email = checked_email(&request.email)?;
    let scope = request.scope.as_deref().map(parse_scope).transpose()?;

    let authenticator = auth.authenticator();
    let password_hash = match request.password.filter(|password| !password.is_empty()) {
        Some(password) => Some(
            authenticator
                .hasher()
                .hash(&SecretString::from(password))
                .await?,
        ),
        None => None,
    };

    let changes = UserChanges {
        first_name,
        last_name,
        email,
        password_hash,
        scope,
    };
    match authenticator.users().update(id, &changes).await? {
        WriteOutcome::Written(user) => {
            info!(
                user_id = user.id,
                tokens_revoked = changes.revokes_tokens(),
                "user updated"
            );
            Ok((StatusCode::OK, Json(user.into())))
        }
        WriteOutcome::NotFound => Err(ApiError::NotFound(USER_NOT_FOUND)),
        WriteOutcome::Conflict => Err(ApiError::Conflict(EMAIL_TAKEN)),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User and its tokens deleted.", body = MessageResponse),
        (status = 400, description = "Invalid id.", body = MessageResponse),
        (status = 404, description = "No such user.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    auth: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let id = parse_user_id(&id)?;
    if !auth.authenticator().users().delete(id).await? {
        return Err(ApiError::NotFound(USER_NOT_FOUND));
    }
    info!(user_id = id, "user deleted");
    Ok((StatusCode::OK, Json(MessageResponse::ok("user deleted"))))
}
