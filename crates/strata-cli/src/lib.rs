//! # strata-cli
//!
//! Command-line interface for Strata's warehouse jobs.
//!
//! ## Commands
//!
//! - `strata init-table` - Create an empty registry table
//! - `strata load` - Replace a table's content from a JSON-lines file
//! - `strata reconcile` - Merge changed customers into the SCD dimension
//! - `strata extract` - Rebuild the future orders extract
//! - `strata show` - Print a table's current content
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `STRATA_STORAGE_URL` - Lake root (default: `file://./lake`)
//! - `STRATA_STORAGE_OPTION_<KEY>` - Storage options such as credentials
//! - `STRATA_WAREHOUSE_SCHEMA` - SQL schema for queries (default: `bmd`)
//! - `STRATA_QUERY_TIMEOUT_SECS` - Query timeout (default: 60)
//! - `STRATA_CRAWLER_URL` - Crawler service endpoint (optional)
//! - `STRATA_LOG_FORMAT` - `pretty` or `json`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::time::Duration;

use clap::{Parser, Subcommand};
use strata_core::{LogFormat, Redacted};

const STORAGE_OPTION_PREFIX: &str = "STRATA_STORAGE_OPTION_";

/// Strata CLI - batch warehouse jobs.
#[derive(Debug, Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Lake root: a `file://`, `s3://`, or `memory://` URL, or a local path.
    #[arg(long, env = "STRATA_STORAGE_URL", default_value = "file://./lake")]
    pub storage_url: String,

    /// Storage option as `key=value` (repeatable), e.g. `aws_region=eu-west-1`.
    #[arg(long = "storage-option", value_parser = parse_key_value)]
    pub storage_options: Vec<(String, String)>,

    /// SQL schema the lake tables are exposed under.
    #[arg(long, env = "STRATA_WAREHOUSE_SCHEMA", default_value = "bmd")]
    pub warehouse_schema: String,

    /// Query timeout in seconds.
    #[arg(long, env = "STRATA_QUERY_TIMEOUT_SECS", default_value_t = 60)]
    pub query_timeout_secs: u64,

    /// Crawler service base URL. Refresh requests are only logged when unset.
    #[arg(long, env = "STRATA_CRAWLER_URL")]
    pub crawler_url: Option<String>,

    /// Log format.
    #[arg(long, env = "STRATA_LOG_FORMAT", default_value = "pretty", value_parser = parse_log_format)]
    pub log_format: LogFormat,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    ///
    /// Storage options come from `--storage-option` flags and from
    /// `STRATA_STORAGE_OPTION_<KEY>` variables in `env`; flags win.
    #[must_use]
    pub fn config<I>(&self, env: I) -> Config
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut storage_options: Vec<(String, Redacted<String>)> = env
            .into_iter()
            .filter_map(|(key, value)| {
                let option = key.strip_prefix(STORAGE_OPTION_PREFIX)?;
                Some((option.to_ascii_lowercase(), Redacted(value)))
            })
            .filter(|(key, _)| !self.storage_options.iter().any(|(flag, _)| flag == key))
            .collect();
        storage_options.extend(
            self.storage_options
                .iter()
                .map(|(key, value)| (key.clone(), Redacted(value.clone()))),
        );
        storage_options.sort_by(|a, b| a.0.cmp(&b.0));

        Config {
            storage_url: self.storage_url.clone(),
            storage_options,
            warehouse_schema: self.warehouse_schema.clone(),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            crawler_url: self.crawler_url.clone(),
            format: self.format.clone(),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_ascii_lowercase(), value.to_string()))
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    LogFormat::parse(raw).ok_or_else(|| format!("unknown log format '{raw}' (use pretty or json)"))
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create an empty registry table.
    InitTable(commands::init_table::InitTableArgs),
    /// Delete every version of a registry table.
    DropTable(commands::drop_table::DropTableArgs),
    /// Replace a table's content from a JSON-lines file.
    Load(commands::load::LoadArgs),
    /// Merge changed customers into the SCD dimension.
    Reconcile(commands::reconcile::ReconcileArgs),
    /// Rebuild the future orders extract.
    Extract(commands::extract::ExtractArgs),
    /// Print a table's current content.
    Show(commands::show::ShowArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lake root URL or path.
    pub storage_url: String,
    /// Storage options, values hidden from `Debug`.
    pub storage_options: Vec<(String, Redacted<String>)>,
    /// SQL schema for queries.
    pub warehouse_schema: String,
    /// Query timeout.
    pub query_timeout: Duration,
    /// Crawler service base URL.
    pub crawler_url: Option<String>,
    /// Output format.
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_from_flags() {
        let cli = Cli::parse_from([
            "strata",
            "--storage-url",
            "s3://lake-bucket/warehouse",
            "--storage-option",
            "AWS_REGION=eu-west-1",
            "--warehouse-schema",
            "analytics",
            "--query-timeout-secs",
            "5",
            "--format",
            "json",
            "extract",
        ]);

        let config = cli.config(Vec::new());
        assert_eq!(config.storage_url, "s3://lake-bucket/warehouse");
        assert_eq!(config.storage_options.len(), 1);
        assert_eq!(config.storage_options[0].0, "aws_region");
        assert_eq!(config.storage_options[0].1.expose(), "eu-west-1");
        assert_eq!(config.warehouse_schema, "analytics");
        assert_eq!(config.query_timeout, Duration::from_secs(5));
        assert!(config.crawler_url.is_none());
        assert!(matches!(config.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Extract(_)));
    }

    #[test]
    fn test_storage_options_from_env_are_redacted() {
        let cli = Cli::parse_from([
            "strata",
            "--storage-option",
            "aws_region=us-east-1",
            "show",
            "orders",
        ]);
        let config = cli.config(vec![
            (
                "STRATA_STORAGE_OPTION_AWS_SECRET_ACCESS_KEY".to_string(),
                "hunter2".to_string(),
            ),
            (
                "STRATA_STORAGE_OPTION_AWS_REGION".to_string(),
                "eu-west-1".to_string(),
            ),
            ("HOME".to_string(), "/root".to_string()),
        ]);

        let keys: Vec<&str> = config
            .storage_options
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["aws_region", "aws_secret_access_key"]);
        assert_eq!(config.storage_options[0].1.expose(), "us-east-1");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_reconcile_args_parse_dates() {
        let cli = Cli::parse_from([
            "strata",
            "reconcile",
            "--source",
            "customers.jsonl",
            "--start",
            "2024-05-01",
            "--end",
            "2024-05-31",
            "--run-date",
            "2024-06-01",
        ]);
        let Commands::Reconcile(args) = cli.command else {
            panic!("expected reconcile");
        };
        assert_eq!(args.start.to_string(), "2024-05-01");
        assert_eq!(args.run_date.map(|d| d.to_string()).as_deref(), Some("2024-06-01"));
    }

    #[tokio::test]
    async fn test_drop_table_requires_confirmation() {
        let cli = Cli::parse_from(["strata", "drop-table", "future_orders"]);
        let config = cli.config(Vec::new());
        let Commands::DropTable(args) = cli.command else {
            panic!("expected drop-table");
        };
        assert_eq!(args.table, "future_orders");
        assert!(!args.yes);

        let err = commands::drop_table::execute(&args, &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--yes"), "{err}");
    }

    #[test]
    fn test_bad_storage_option_is_rejected() {
        let result = Cli::try_parse_from(["strata", "--storage-option", "novalue", "extract"]);
        assert!(result.is_err());
    }
}
