//! Maps validated CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_ENV, ARG_PORT, auth, database};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(4001);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let environment = matches
        .get_one::<String>(ARG_ENV)
        .cloned()
        .unwrap_or_else(|| "development".to_string());

    let auth_opts = auth::Options::parse(matches)?;
    let db_opts = database::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        environment,
        run_migrations: db_opts.run_migrations,
        db_max_connections: db_opts.max_connections,
        store_timeout: db_opts.store_timeout,
        frontend_base_url: auth_opts.frontend_base_url,
        token_base_ttl_seconds: auth_opts.token_base_ttl_seconds,
        token_extension_min_minutes: auth_opts.token_extension_min_minutes,
        token_extension_max_minutes: auth_opts.token_extension_max_minutes,
        bcrypt_cost: auth_opts.bcrypt_cost,
        admin: auth_opts.admin,
    }))
}
