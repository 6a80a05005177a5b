//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Semlog - semantic event logger for physics episodes
#[derive(Parser, Debug)]
#[command(
    name = "semlog",
    author,
    version,
    about = "Semantic event logger for simulated manipulation episodes",
    long_about = "Replays a physics scenario through contact, grasp and reach monitors.\n\n\
                  Overlap notifications are turned into timestamped semantic events \n\
                  (Contact, SupportedBy, Grasp, Reach, PreGrasp) and dispatched to sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SEMLOG_VERBOSE")]
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
        env = "SEMLOG_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario and log its semantic events
    Run(RunArgs),

    /// Validate a logger blueprint without running
    Validate(ValidateArgs),

    /// Display blueprint information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to logger blueprint (TOML or JSON)
    #[arg(short, long, default_value = "semlog.toml", env = "SEMLOG_CONFIG")]
    pub config: PathBuf,

    /// Path to scenario script (TOML or JSON)
    #[arg(short, long, env = "SEMLOG_SCENARIO")]
    pub scenario: PathBuf,

    /// Validate blueprint and scenario, then exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size between the monitors and the dispatcher
    #[arg(long, default_value = "1024", env = "SEMLOG_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SEMLOG_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to blueprint file to validate
    #[arg(short, long, default_value = "semlog.toml", env = "SEMLOG_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to blueprint file
    #[arg(short, long, default_value = "semlog.toml", env = "SEMLOG_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-monitor details
    #[arg(long)]
    pub monitors: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
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
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "semlog",
            "run",
            "--config",
            "kitchen.toml",
            "--scenario",
            "pick_cup.toml",
            "--metrics-port",
            "9100",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("kitchen.toml"));
                assert_eq!(args.scenario, PathBuf::from("pick_cup.toml"));
                assert_eq!(args.metrics_port, 9100);
                assert_eq!(args.buffer_size, 1024);
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["semlog", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
