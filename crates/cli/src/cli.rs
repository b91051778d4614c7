//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Broadcaster - channel-based Server-Sent Events fan-out
#[derive(Parser, Debug)]
#[command(
    name = "broadcaster",
    author,
    version,
    about = "Channel-based Server-Sent Events broadcaster",
    long_about = "Fans events out to HTTP clients subscribed to named channels.\n\n\
                  Clients reconnecting with Last-Event-ID are replayed the history \n\
                  they missed before live delivery resumes."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BROADCASTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BROADCASTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the broadcaster HTTP server
    Serve(ServeArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `serve` command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "broadcaster.toml",
        env = "BROADCASTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override listen host from configuration
    #[arg(long, env = "BROADCASTER_HOST")]
    pub host: Option<String>,

    /// Override listen port from configuration
    #[arg(long, env = "BROADCASTER_PORT")]
    pub port: Option<u16>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BROADCASTER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "broadcaster.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "broadcaster.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "broadcaster",
            "-v",
            "serve",
            "--config",
            "b.toml",
            "--port",
            "9090",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("b.toml"));
                assert_eq!(args.port, Some(9090));
                assert_eq!(args.host, None);
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["broadcaster", "-q", "-v", "info"]).is_err());
    }
}
