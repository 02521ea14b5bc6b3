//! Summarize who changed how many lines in a hosted repository or pull request.
//!
//! # Usage
//!
//! ```bash
//! contrib-metrics https://github.com/tokio-rs/tokio
//! contrib-metrics https://github.com/tokio-rs/tokio/pull/7000 --json
//! contrib-metrics https://github.com/tokio-rs/tokio --since 2025-01-01T00:00:00Z
//! ```
//!
//! The token used for every request is read from `GITHUB_TOKEN` or `--token`; a token set on
//! a source in the configuration file takes precedence.
//!
//! # Configuration
//!
//! Without `--config`, the built-in configuration serving `github.com` repositories and pull
//! requests is used. A configuration file (`.toml`, `.yml`/`.yaml`, or `.json`) replaces it:
//!
//! ```toml
//! throttle_limit = 5
//! max_pages = 1000
//!
//! [[sources]]
//! name = "github-repository"
//! pattern = '^https?://github\.com/(?P<owner>[^/]+)/(?P<repo>[^/]+)'
//! strategy = "repository"
//! graphql_endpoint = "https://api.github.com/graphql"
//! stats_endpoint = "https://api.github.com/repos"
//! branch = "main"
//! ```
//!
//! # Output
//!
//! One `(Name, Total Changes)` row per contributor email, in first-seen order, preceded by a
//! header row. When a fetch stops early the rows gathered so far are still printed and the
//! process exits with an error.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, ValueEnum};
use contrib_metrics::config::Config;
use contrib_metrics::report::{ChartRow, ChartValue};
use contrib_metrics::{MetricsFetcher, Result};
use ohno::{IntoAppError, bail};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

#[derive(Parser, Debug)]
#[command(name = "contrib-metrics", version, about)]
#[command(styles = CLAP_STYLES)]
struct Args {
    /// Repository or pull request URL
    url: String,

    /// Path to a configuration file (default: built-in configuration)
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// Only include commits after this instant (RFC 3339, repository URLs only)
    #[arg(long, value_name = "DATETIME")]
    since: Option<DateTime<Utc>>,

    /// Token for sources that do not configure their own
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    token: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    log_level: LogLevel,

    /// Print the rows as a JSON array of `[label, value]` pairs
    #[arg(long)]
    json: bool,
}

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?.0,
        None => Config::default(),
    };

    if let Some(token) = args.token.as_deref().filter(|t| !t.is_empty()) {
        config.apply_default_token(token);
    }

    let warnings = config.validate()?;
    if !warnings.is_empty() {
        eprintln!("Configuration warnings:");
        for warning in &warnings {
            eprintln!("   {warning}");
        }
        eprintln!();
    }

    Ok(config)
}

const UNKNOWN_LABEL: &str = "<unknown>";

fn display_label(label: &str) -> &str {
    if label.is_empty() { UNKNOWN_LABEL } else { label }
}

fn print_table(rows: &[ChartRow]) {
    let width = rows.iter().map(|row| display_label(&row.0).len()).max().unwrap_or(0);

    for ChartRow(label, value) in rows {
        let label = display_label(label);
        match value {
            ChartValue::Text(text) => println!("{label:<width$}  {text}"),
            ChartValue::Count(count) => println!("{label:<width$}  {count:>13}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    let config = load_config(&args)?;
    let fetcher = MetricsFetcher::new(&config)?;

    if !fetcher.supports(&args.url) {
        bail!("no configured source supports '{}'", args.url);
    }

    let result = fetcher.fetch(&args.url, args.since).await;
    let rows = MetricsFetcher::aggregate(&result);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows).into_app_err("serializing chart rows")?);
    } else {
        print_table(&rows);
    }

    if let Some(error) = result.error() {
        bail!("fetch stopped after {} commit(s): {error}", result.data().len());
    }

    Ok(())
}
