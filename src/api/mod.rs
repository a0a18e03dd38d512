use crate::{
    api::handlers::{authenticate, gate, health, hello, users},
    auth::{AuthConfig, AuthState, Capability, Scope, SystemClock, repo},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, field, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const CORS_MAX_AGE: Duration = Duration::from_secs(300);

/// Start the server
/// # Errors
/// Return error if the listener cannot bind or the server fails
pub async fn new(port: u16, pool: PgPool, auth_config: AuthConfig) -> Result<()> {
    let auth_state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(repo::PgUserRepo::new(pool.clone())),
        Arc::new(repo::PgTokenRepo::new(pool)),
        Arc::new(SystemClock),
    ));

    let app = app(auth_state)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// The full application: routes plus request id, tracing, CORS and state layers.
///
/// # Errors
/// Returns an error if the configured frontend URL is not a valid origin.
pub fn app(auth_state: Arc<AuthState>) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .max_age(CORS_MAX_AGE);

    Ok(router()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state)),
        ))
}

/// Route table. Each protected group carries its own required scope.
#[must_use]
pub fn router() -> Router {
    let public = Router::new()
        .route("/hello", get(hello::hello))
        .route("/api/authenticate", post(authenticate::authenticate))
        .route("/health", get(health::health).options(health::health));

    let any_token = gate::protect(
        Router::new()
            .route("/api/hello-user", get(hello::hello_user))
            .route("/api/logout", post(authenticate::logout)),
        Scope::empty(),
    );

    let read_a = gate::protect(
        Router::new().route("/api/read-a/hello-user", get(hello::hello_user)),
        Scope::from([Capability::ReadA]),
    );

    let read_a_write_a = gate::protect(
        Router::new().route("/api/read-a-write-a/hello-user", get(hello::hello_user)),
        Scope::from([Capability::ReadA, Capability::WriteA]),
    );

    let admin = gate::protect(
        Router::new()
            .route("/api/admin/hello-user", get(hello::hello_user))
            .route(
                "/api/admin/users",
                get(users::list_users).post(users::create_user),
            )
            .route(
                "/api/admin/users/:id",
                get(users::get_user)
                    .put(users::update_user)
                    .delete(users::delete_user),
            ),
        Scope::all(),
    );

    public
        .merge(any_token)
        .merge(read_a)
        .merge(read_a_write_a)
        .merge(admin)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id,
        user_id = field::Empty
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://app.example.com:8443/login?next=1")?;
        assert_eq!(origin, "https://app.example.com:8443");
        assert_eq!(frontend_origin("http://localhost:4000")?, "http://localhost:4000");
        Ok(())
    }

    #[test]
    fn frontend_origin_requires_host() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("mailto:ops@example.com").is_err());
    }
}
