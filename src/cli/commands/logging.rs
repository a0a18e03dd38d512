use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; the index is the count `-v` would reach.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const MAX_VERBOSITY: u8 = 5;

/// Accept a level name (any case) or a verbosity count up to 5.
fn parse_verbosity(raw: &str) -> Result<u8, String> {
    let value = raw.trim();
    if let Ok(count) = value.parse::<u8>() {
        return if count <= MAX_VERBOSITY {
            Ok(count)
        } else {
            Err(format!("verbosity must be at most {MAX_VERBOSITY}"))
        };
    }

    LEVEL_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("unknown log level '{value}', expected one of {LEVEL_NAMES:?}"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity (-v warn .. -vvvv trace); default logs errors only")
            .env("SCOPEGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::new(parse_verbosity)),
    )
}
