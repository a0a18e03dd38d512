use crate::{
    api,
    auth::{AuthConfig, AuthState, SystemClock, repo},
    cli::{commands::auth::AdminOptions, telemetry},
    db,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub environment: String,
    pub run_migrations: bool,
    pub db_max_connections: u32,
    pub store_timeout: Duration,
    pub frontend_base_url: String,
    pub token_base_ttl_seconds: i64,
    pub token_extension_min_minutes: i64,
    pub token_extension_max_minutes: i64,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminOptions>,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.frontend_base_url.clone())
            .with_store_timeout(self.store_timeout)
            .with_token_ttl(
                self.token_base_ttl_seconds,
                self.token_extension_min_minutes,
                self.token_extension_max_minutes,
            )
            .with_bcrypt_cost(self.bcrypt_cost)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema or bootstrap
/// admin cannot be applied, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let pool = db::connect(
        args.dsn.expose_secret(),
        args.db_max_connections,
        args.store_timeout,
    )
    .await?;

    if args.run_migrations {
        db::migrate(&pool).await?;
    }

    let auth_config = args.auth_config();

    if let Some(admin) = &args.admin {
        bootstrap_admin(&pool, auth_config.clone(), admin).await?;
    }

    let result = api::new(args.port, pool, auth_config).await;
    telemetry::shutdown_tracer();
    result
}

async fn bootstrap_admin(pool: &PgPool, config: AuthConfig, admin: &AdminOptions) -> Result<()> {
    let state = AuthState::new(
        config,
        Arc::new(repo::PgUserRepo::new(pool.clone())),
        Arc::new(repo::PgTokenRepo::new(pool.clone())),
        Arc::new(SystemClock),
    );
    let created = state
        .authenticator()
        .ensure_admin(&admin.email, &admin.password)
        .await
        .context("Failed to create bootstrap admin")?;
    if created {
        info!("Created bootstrap admin {}", admin.email);
    }
    Ok(())
}

fn log_startup_args(args: &Args) {
    let dsn = if args.environment == "development" {
        db::redact_dsn(args.dsn.expose_secret())
    } else {
        "[hidden]".to_string()
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("environment", args.environment.clone()),
        ("dsn", dsn),
        ("run_migrations", args.run_migrations.to_string()),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("store_timeout", format!("{}s", args.store_timeout.as_secs())),
        ("frontend_base_url", args.frontend_base_url.clone()),
        ("token_base_ttl", format!("{}s", args.token_base_ttl_seconds)),
        (
            "token_extension",
            format!(
                "{}..={} min",
                args.token_extension_min_minutes, args.token_extension_max_minutes
            ),
        ),
        ("bcrypt_cost", args.bcrypt_cost.to_string()),
        (
            "admin_email",
            args.admin
                .as_ref()
                .map_or_else(|| "n/a".to_string(), |admin| admin.email.clone()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "scopegate {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}
