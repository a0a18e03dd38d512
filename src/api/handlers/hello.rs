use axum::{Json, http::StatusCode};

use super::MessageResponse;
use crate::auth::AuthenticatedUser;

#[utoipa::path(
    get,
    path = "/hello",
    responses((status = 200, description = "Public greeting.", body = MessageResponse)),
    tag = "hello"
)]
pub async fn hello() -> (StatusCode, Json<MessageResponse>) {
    (StatusCode::OK, Json(MessageResponse::ok("Hello!")))
}

/// Greets the caller; mounted once per scope group.
#[utoipa::path(
    get,
    path = "/api/hello-user",
    responses(
        (status = 200, description = "Greeting for the token owner.", body = MessageResponse),
        (status = 401, description = "Missing, invalid or expired token, or insufficient scope.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "hello"
)]
pub async fn hello_user(principal: AuthenticatedUser) -> (StatusCode, Json<MessageResponse>) {
    let user = principal.user();
    (
        StatusCode::OK,
        Json(MessageResponse::ok(format!(
            "Hello {} {} ({})!",
            user.first_name, user.last_name, user.email
        ))),
    )
}
