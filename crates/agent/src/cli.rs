use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "alertforge-agent",
    about = "AlertForge alerting agent",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: String,

    /// Log level override (takes precedence over config file)
    #[arg(short, long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Log format: json (default) or text
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a stream of fact ticks against the configured triggers
    Run {
        /// JSON-lines file with one tick (array of facts) per line, or `-` for stdin
        #[arg(long, default_value = "-")]
        facts: PathBuf,

        /// Write the final metrics in OpenMetrics text format to this file
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// Load and validate the configuration, then print a summary
    Validate,

    /// Evaluate one event expression against one event
    Match {
        /// Expression, e.g. "tenantId == 'acme',ctime > 0"
        #[arg(short, long)]
        expression: String,

        /// Event as JSON (camelCase fields)
        #[arg(long)]
        event: String,
    },

    /// Display version and build information
    Version,
}

/// Parse CLI arguments.
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_run_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["alertforge-agent", "run"]).unwrap();
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert!(cli.log_level.is_none());
        assert!(cli.log_format.is_none());
        match cli.command {
            Command::Run {
                facts,
                metrics_file,
            } => {
                assert_eq!(facts, PathBuf::from("-"));
                assert!(metrics_file.is_none());
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn cli_run_with_paths() {
        let cli = Cli::try_parse_from([
            "alertforge-agent",
            "run",
            "--facts",
            "/tmp/ticks.jsonl",
            "--metrics-file",
            "/tmp/metrics.txt",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                facts,
                metrics_file,
            } => {
                assert_eq!(facts, PathBuf::from("/tmp/ticks.jsonl"));
                assert_eq!(metrics_file, Some(PathBuf::from("/tmp/metrics.txt")));
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "alertforge-agent",
            "validate",
            "--config",
            "/tmp/test.yaml",
            "--log-level",
            "debug",
            "--log-format",
            "text",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Validate));
        assert_eq!(cli.config, "/tmp/test.yaml");
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert_eq!(cli.log_format, Some(LogFormat::Text));
    }

    #[test]
    fn cli_match_requires_expression_and_event() {
        let cli = Cli::try_parse_from([
            "alertforge-agent",
            "match",
            "--expression",
            "tenantId == 'acme'",
            "--event",
            r#"{"tenantId":"acme","id":"e1","ctime":1}"#,
        ])
        .unwrap();
        match cli.command {
            Command::Match { expression, event } => {
                assert_eq!(expression, "tenantId == 'acme'");
                assert!(event.contains("acme"));
            }
            _ => panic!("expected Match"),
        }

        let result = Cli::try_parse_from(["alertforge-agent", "match", "--expression", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_output_json() {
        let cli = Cli::try_parse_from(["alertforge-agent", "validate", "-o", "json"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn cli_output_invalid_rejected() {
        let result = Cli::try_parse_from(["alertforge-agent", "validate", "--output", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_invalid_log_level_rejected() {
        let result = Cli::try_parse_from(["alertforge-agent", "run", "--log-level", "verbose"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_subcommand_required() {
        assert!(Cli::try_parse_from(["alertforge-agent"]).is_err());
    }

    #[test]
    fn cli_version() {
        let cli = Cli::try_parse_from(["alertforge-agent", "version"]).unwrap();
        assert!(matches!(cli.command, Command::Version));
    }
}
