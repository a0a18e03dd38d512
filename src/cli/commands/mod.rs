pub mod auth;
pub mod database;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_ENV: &str = "env";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("scopegate")
        .about("User management API guarded by scoped bearer tokens")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("4001")
                .env("SCOPEGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("SCOPEGATE_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ENV)
                .long("env")
                .help("Deployment environment")
                .long_help(
                    "Deployment environment. The connection string is only logged (redacted) in development.",
                )
                .env("SCOPEGATE_ENV")
                .default_value("development")
                .value_parser(["development", "staging", "production"]),
        );

    let command = auth::with_args(command);
    let command = database::with_args(command);
    logging::with_args(command)
}
