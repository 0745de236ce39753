//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Routing Processor host - runs routes and their processors from a blueprint
#[derive(Parser, Debug)]
#[command(
    name = "routing-proc",
    author,
    version,
    about = "Host for routing processors",
    long_about = "Runs a routing blueprint: builds the routes, drives their processors \n\
                  through the route lifecycle, moves samples between streams and \n\
                  reports stream traffic to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ROUTING_PROC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ROUTING_PROC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every route of a blueprint
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "routing.toml",
        env = "ROUTING_PROC_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines file of samples to inject once routes are running
    #[arg(long, env = "ROUTING_PROC_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Stop after this many seconds (0 = until Ctrl-C, or until the replay ends)
    #[arg(long, default_value = "0", env = "ROUTING_PROC_DURATION")]
    pub duration_secs: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ROUTING_PROC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "routing.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "routing.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the ports of every route
    #[arg(long)]
    pub ports: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::parse_from([
            "routing-proc",
            "-v",
            "run",
            "--config",
            "shapes.toml",
            "--replay",
            "samples.jsonl",
            "--duration-secs",
            "5",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("shapes.toml"));
                assert_eq!(args.replay, Some(PathBuf::from("samples.jsonl")));
                assert_eq!(args.duration_secs, 5);
                assert_eq!(args.metrics_port, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["routing-proc", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_info_flags() {
        let cli = Cli::parse_from(["routing-proc", "info", "--ports", "--json"]);
        match cli.command {
            Commands::Info(args) => {
                assert!(args.ports);
                assert!(args.json);
                assert!(!args.sinks);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
