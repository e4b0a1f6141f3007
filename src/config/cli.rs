use clap::Parser;
use std::path::PathBuf;

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub config_file_location: PathBuf,
    pub bind_override: Option<String>,
    pub log_level: LogLevel,
}

impl CliConfig {
    /// Malformed arguments are a fatal startup condition (exit 1); `--help`
    /// and `--version` keep clap's own behavior.
    pub fn from_args() -> Self {
        match Args::try_parse() {
            Ok(args) => args.into(),
            Err(e) if e.use_stderr() => {
                let _ = e.print();
                std::process::exit(1);
            }
            Err(e) => e.exit(),
        }
    }
}

impl From<Args> for CliConfig {
    fn from(args: Args) -> Self {
        Self {
            config_file_location: args.config_file,
            bind_override: args.bind,
            log_level: args.log_level,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "busgate", version, about = "Client gateway for the object bus")]
struct Args {
    // Must exist; no defaults.
    #[arg(long = "config", short = 'c', env = "BUSGATE_CONFIG_FILE")]
    config_file: PathBuf,

    // host:port, overrides `bind` from the config file.
    #[arg(long = "bind", short = 'b', env = "BUSGATE_BIND")]
    bind: Option<String>,

    // Not required via CLI or ENV (defaults to info). RUST_LOG wins when set.
    #[arg(long = "log", value_enum, default_value = "info")]
    log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let args = Args::try_parse_from([
            "busgate",
            "--config",
            "gateway.toml",
            "--bind",
            "127.0.0.1:7000",
            "--log",
            "debug",
        ])
        .unwrap();

        let cli = CliConfig::from(args);
        assert_eq!(cli.config_file_location, PathBuf::from("gateway.toml"));
        assert_eq!(cli.bind_override.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn log_level_defaults_to_info() {
        let args = Args::try_parse_from(["busgate", "-c", "gateway.toml"]).unwrap();
        let cli = CliConfig::from(args);
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Args::try_parse_from(["busgate", "-c", "gateway.toml", "--log", "loud"]);
        assert!(err.is_err());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
