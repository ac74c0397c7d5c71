//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use logsift_core::types::SortOrder;

/// logsift -- search substrate for normalized security logs.
///
/// Use `logsift <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logsift", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logsift.toml configuration file.
    #[arg(short, long, global = true, default_value = "logsift.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split free text into typed query terms.
    Parse(ParseArgs),

    /// Print the backend request a query compiles to, without running it.
    Compile(CompileArgs),

    /// Run a query against a log type and print one page of hits.
    Search(SearchArgs),

    /// Resolve a permalink locator to the document(s) it names.
    Resolve(ResolveArgs),

    /// Stream every matching document as NDJSON.
    Export(ExportArgs),

    /// Load an NDJSON file into a fresh index generation and cut the alias over.
    Load(LoadArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

impl Commands {
    /// Whether the command needs a loaded configuration before it runs.
    ///
    /// `config` loads the file itself so that it can report load failures.
    pub fn needs_config(&self) -> bool {
        !matches!(self, Self::Parse(_) | Self::Config(_))
    }
}

// ---- shared ----

/// Time window selection shared by query commands.
///
/// `--since`/`--until` pick explicit bounds; otherwise the window is the
/// `--last` span ending at `--until` (or now).
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Window start (RFC 3339). Overrides --last.
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// Window end (RFC 3339, default: now).
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,

    /// Window length ending at --until (e.g. 30s, 15m, 24h, 7d).
    #[arg(long, default_value = "24h", value_parser = parse_span)]
    pub last: TimeDelta,
}

// ---- parse ----

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Query text. Use `--` before terms that start with `-`.
    #[arg(required = true)]
    pub query: Vec<String>,
}

// ---- compile ----

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Log type name from the configuration.
    #[arg(short = 't', long)]
    pub log_type: String,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Query text. Use `--` before terms that start with `-`.
    #[arg(required = true)]
    pub query: Vec<String>,
}

// ---- search ----

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Log type name from the configuration.
    #[arg(short = 't', long)]
    pub log_type: String,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Sort column (logical name). Default: the log type's default sort.
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort direction (asc, desc).
    #[arg(long, value_parser = parse_order)]
    pub order: Option<SortOrder>,

    /// Offset of the first hit.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Page size (capped by search.max_page_size).
    #[arg(long)]
    pub size: Option<usize>,

    /// Skip highlight fragments.
    #[arg(long)]
    pub no_highlight: bool,

    /// Query text. Use `--` before terms that start with `-`.
    #[arg(required = true)]
    pub query: Vec<String>,
}

// ---- resolve ----

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Log type name from the configuration.
    #[arg(short = 't', long)]
    pub log_type: String,

    /// Permalink locator.
    pub locator: String,
}

// ---- export ----

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Log type name from the configuration.
    #[arg(short = 't', long)]
    pub log_type: String,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Documents per scroll page (default: search.scroll_page_size).
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Write NDJSON to this file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Query text. Use `--` before terms that start with `-`.
    #[arg(required = true)]
    pub query: Vec<String>,
}

// ---- load ----

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Log type name from the configuration.
    #[arg(short = 't', long)]
    pub log_type: String,

    /// NDJSON file of normalized documents (`-` for stdin).
    pub input: PathBuf,

    /// Index mapping JSON file (default: the common schema mapping).
    #[arg(long)]
    pub mapping: Option<PathBuf>,
}

// ---- config ----

/// Manage logsift configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, backend, indexer, search, log_types).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- value parsers ----

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected RFC 3339 timestamp: {e}"))
}

/// Parse a span such as `90s`, `15m`, `24h` or `7d`.
pub(crate) fn parse_span(s: &str) -> Result<TimeDelta, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in '{s}' (expected s, m, h or d)"))?;
    let (digits, unit) = s.split_at(split);
    let amount: i64 = digits
        .parse()
        .map_err(|_| format!("invalid span amount in '{s}'"))?;
    if amount == 0 {
        return Err("span must be greater than zero".to_owned());
    }
    let unit_secs = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        other => return Err(format!("unknown span unit '{other}' (expected s, m, h or d)")),
    };
    amount
        .checked_mul(unit_secs)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| format!("span '{s}' is too large"))
}

fn parse_order(s: &str) -> Result<SortOrder, String> {
    SortOrder::from_str_loose(s).ok_or_else(|| format!("expected asc or desc, got '{s}'"))
}
