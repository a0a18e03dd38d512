use anyhow::{Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::token::{MAX_BASE_TTL_SECONDS, MAX_EXTENSION_MINUTES};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_TOKEN_BASE_TTL_SECONDS: &str = "token-base-ttl-seconds";
pub const ARG_TOKEN_EXTENSION_MIN_MINUTES: &str = "token-extension-min-minutes";
pub const ARG_TOKEN_EXTENSION_MAX_MINUTES: &str = "token-extension-max-minutes";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";
pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub token_base_ttl_seconds: i64,
    pub token_extension_min_minutes: i64,
    pub token_extension_max_minutes: i64,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminOptions>,
}

/// Credentials of the account created at startup when absent.
#[derive(Debug)]
pub struct AdminOptions {
    pub email: String,
    pub password: SecretString,
}

impl Options {
    /// Read auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if the extension window is inverted or only half of the
    /// admin credentials is given.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:4000".to_string());
        let token_base_ttl_seconds = matches
            .get_one::<i64>(ARG_TOKEN_BASE_TTL_SECONDS)
            .copied()
            .unwrap_or(7200);
        let token_extension_min_minutes = matches
            .get_one::<i64>(ARG_TOKEN_EXTENSION_MIN_MINUTES)
            .copied()
            .unwrap_or(-55);
        let token_extension_max_minutes = matches
            .get_one::<i64>(ARG_TOKEN_EXTENSION_MAX_MINUTES)
            .copied()
            .unwrap_or(1380);
        let bcrypt_cost = matches
            .get_one::<u32>(ARG_BCRYPT_COST)
            .copied()
            .unwrap_or(12);

        if token_extension_min_minutes > token_extension_max_minutes {
            return Err(anyhow!(
                "--{ARG_TOKEN_EXTENSION_MIN_MINUTES} must not exceed --{ARG_TOKEN_EXTENSION_MAX_MINUTES}"
            ));
        }

        let admin = match (
            matches.get_one::<String>(ARG_ADMIN_EMAIL),
            matches.get_one::<String>(ARG_ADMIN_PASSWORD),
        ) {
            (Some(email), Some(password)) => Some(AdminOptions {
                email: email.clone(),
                password: SecretString::from(password.clone()),
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "--{ARG_ADMIN_EMAIL} and --{ARG_ADMIN_PASSWORD} must be set together"
                ));
            }
        };

        Ok(Self {
            frontend_base_url,
            token_base_ttl_seconds,
            token_extension_min_minutes,
            token_extension_max_minutes,
            bcrypt_cost,
            admin,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_admin_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL allowed by CORS")
                .env("SCOPEGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:4000"),
        )
        .arg(
            Arg::new(ARG_TOKEN_BASE_TTL_SECONDS)
                .long(ARG_TOKEN_BASE_TTL_SECONDS)
                .help("Base token lifetime in seconds")
                .env("SCOPEGATE_TOKEN_BASE_TTL_SECONDS")
                .default_value("7200")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_BASE_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_TOKEN_EXTENSION_MIN_MINUTES)
                .long(ARG_TOKEN_EXTENSION_MIN_MINUTES)
                .help("Smallest expiry adjustment a client may request, in minutes")
                .env("SCOPEGATE_TOKEN_EXTENSION_MIN_MINUTES")
                .default_value("-55")
                .allow_negative_numbers(true)
                .value_parser(
                    clap::value_parser!(i64).range(-MAX_EXTENSION_MINUTES..=MAX_EXTENSION_MINUTES),
                ),
        )
        .arg(
            Arg::new(ARG_TOKEN_EXTENSION_MAX_MINUTES)
                .long(ARG_TOKEN_EXTENSION_MAX_MINUTES)
                .help("Largest expiry adjustment a client may request, in minutes")
                .env("SCOPEGATE_TOKEN_EXTENSION_MAX_MINUTES")
                .default_value("1380")
                .allow_negative_numbers(true)
                .value_parser(
                    clap::value_parser!(i64).range(-MAX_EXTENSION_MINUTES..=MAX_EXTENSION_MINUTES),
                ),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt cost for new password hashes")
                .env("SCOPEGATE_BCRYPT_COST")
                .default_value("12")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}

fn with_admin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Email of an administrator created at startup if missing")
                .env("SCOPEGATE_ADMIN_EMAIL"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password of the startup administrator")
                .env("SCOPEGATE_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
}
