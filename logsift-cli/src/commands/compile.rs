//! `logsift compile` command handler
//!
//! Prints the request body `search` would send, without touching the backend.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use logsift_core::config::SiftConfig;
use logsift_indexer::SearchParams;

use crate::cli::CompileArgs;
use crate::commands::{query_text, searcher, time_window};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `compile` command.
pub fn execute(
    args: CompileArgs,
    config: &SiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = build_report(&args, config, Utc::now())?;
    info!(log_type = %args.log_type, alias = %report.alias, "compiled query");
    writer.render(&report)
}

fn build_report(
    args: &CompileArgs,
    config: &SiftConfig,
    now: DateTime<Utc>,
) -> Result<CompileReport, CliError> {
    let window = time_window(&args.window, now)?;
    let searcher = searcher(config, &args.log_type)?;
    let query = query_text(&args.query);
    let body = searcher
        .build_request(&query, &window, &SearchParams::default())
        .to_body();
    Ok(CompileReport {
        log_type: args.log_type.clone(),
        alias: searcher.alias().to_owned(),
        start: window.start(),
        end: window.end(),
        query,
        body,
    })
}

/// Compiled request report.
#[derive(Debug, Serialize)]
pub struct CompileReport {
    pub log_type: String,
    pub alias: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub query: String,
    /// Backend request body
    pub body: Value,
}

impl Render for CompileReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} -> {} [{} .. {})",
            self.log_type.bold(),
            self.alias,
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )?;
        let body = serde_json::to_string_pretty(&self.body).map_err(std::io::Error::other)?;
        writeln!(w, "{body}")
    }
}
