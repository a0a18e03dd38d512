//! Connection pool and schema setup.

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{Instrument, info, info_span};

/// Schema applied by `--run-migrations`.
pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Connect to the database.
/// # Errors
/// Returns an error if the pool cannot be established.
pub async fn connect(dsn: &str, max_connections: u32, acquire_timeout: Duration) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Apply the schema statement by statement.
/// # Errors
/// Returns an error naming the first statement that fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let statements = split_sql_statements(SCHEMA);
    for statement in &statements {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "MIGRATE",
            db.statement = statement.as_str()
        );
        sqlx::query(statement)
            .execute(pool)
            .instrument(span)
            .await
            .with_context(|| format!("Failed to apply schema statement: {statement}"))?;
    }
    info!("Applied {} schema statements", statements.len());
    Ok(())
}

/// Split a SQL script on statement-terminating semicolons, dropping
/// comment-only lines.
#[must_use]
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Strip the password from a DSN before it is logged.
#[must_use]
pub fn redact_dsn(dsn: &str) -> String {
    match url::Url::parse(dsn) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                "[redacted]".to_string()
            }
        }
        Ok(url) => url.to_string(),
        Err(_) => "[redacted]".to_string(),
    }
}
