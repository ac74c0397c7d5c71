//! `logsift resolve` command handler

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use logsift_core::config::SiftConfig;
use logsift_indexer::PermalinkMatch;
use logsift_indexer::permalink;

use crate::cli::ResolveArgs;
use crate::commands::searcher;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `resolve` command.
///
/// The locator is decoded before any backend call, so a malformed locator
/// fails with an input error even when the backend is unreachable.
pub async fn execute(
    args: ResolveArgs,
    config: &SiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let locator = permalink::decode(&args.locator).map_err(|e| CliError::Input(e.to_string()))?;
    let searcher = searcher(config, &args.log_type)?;
    let matches = searcher.resolve(&args.locator).await?;
    info!(
        log_type = %args.log_type,
        matches = matches.len(),
        "locator resolved"
    );

    writer.render(&ResolveReport {
        locator: args.locator,
        received_time: locator.received_time(),
        record_finder: locator.record_finder().to_owned(),
        matches,
    })
}

/// Permalink resolution report.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub locator: String,
    pub received_time: DateTime<Utc>,
    pub record_finder: String,
    /// Empty when the document has been deleted or was never indexed
    pub matches: Vec<PermalinkMatch>,
}

impl Render for ResolveReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Locator {} (receivedTime {}, recordFinder {})",
            self.locator.bold(),
            self.received_time.to_rfc3339(),
            self.record_finder
        )?;
        if self.matches.is_empty() {
            writeln!(w, "  {}", "no matching document".yellow())?;
        }
        for m in &self.matches {
            writeln!(w, "  {}/{}", m.index, m.id)?;
        }
        Ok(())
    }
}
