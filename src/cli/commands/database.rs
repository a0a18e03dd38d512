use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_RUN_MIGRATIONS: &str = "run-migrations";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";
pub const ARG_STORE_TIMEOUT_SECONDS: &str = "store-timeout-seconds";

#[derive(Debug)]
pub struct Options {
    pub run_migrations: bool,
    pub max_connections: u32,
    pub store_timeout: Duration,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            run_migrations: matches.get_flag(ARG_RUN_MIGRATIONS),
            max_connections: matches
                .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
                .copied()
                .unwrap_or(5),
            store_timeout: Duration::from_secs(
                matches
                    .get_one::<u64>(ARG_STORE_TIMEOUT_SECONDS)
                    .copied()
                    .unwrap_or(3),
            ),
        }
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RUN_MIGRATIONS)
                .long(ARG_RUN_MIGRATIONS)
                .help("Create missing tables and indexes before serving")
                .env("SCOPEGATE_RUN_MIGRATIONS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum connections in the database pool")
                .env("SCOPEGATE_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_SECONDS)
                .long(ARG_STORE_TIMEOUT_SECONDS)
                .help("Deadline for a single store operation, in seconds")
                .env("SCOPEGATE_STORE_TIMEOUT_SECONDS")
                .default_value("3")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
