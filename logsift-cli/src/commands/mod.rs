//! Command handlers -- one module per subcommand

pub mod compile;
pub mod config;
pub mod export;
pub mod load;
pub mod parse;
pub mod resolve;
pub mod search;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logsift_core::config::SiftConfig;
use logsift_indexer::{HttpBackend, LogSearcher};
use logsift_query::{ColumnRegistry, TimeWindow};

use crate::cli::WindowArgs;
use crate::error::CliError;

/// Join positional query words back into one query string.
pub(crate) fn query_text(words: &[String]) -> String {
    words.join(" ")
}

/// Turn window arguments into a validated [`TimeWindow`].
pub(crate) fn time_window(args: &WindowArgs, now: DateTime<Utc>) -> Result<TimeWindow, CliError> {
    let end = args.until.unwrap_or(now);
    let start = args.since.unwrap_or(end - args.last);
    Ok(TimeWindow::new(start, end)?)
}

/// Build the column registry for a configured log type.
pub(crate) fn registry(config: &SiftConfig, log_type: &str) -> Result<ColumnRegistry, CliError> {
    let log_type = config.log_type(log_type).map_err(|e| CliError::Config(e.to_string()))?;
    Ok(ColumnRegistry::for_log_type(log_type)?)
}

/// Connect a searcher for a configured log type.
pub(crate) fn searcher(
    config: &SiftConfig,
    log_type: &str,
) -> Result<LogSearcher<HttpBackend>, CliError> {
    let alias = config
        .log_type(log_type)
        .map_err(|e| CliError::Config(e.to_string()))?
        .alias
        .clone();
    let registry = registry(config, log_type)?;
    let backend = HttpBackend::new(&config.backend).map_err(|e| CliError::Backend(e.to_string()))?;
    Ok(LogSearcher::new(
        Arc::new(backend),
        alias,
        Arc::new(registry),
        &config.search,
    ))
}
