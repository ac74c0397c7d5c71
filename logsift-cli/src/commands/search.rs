//! `logsift search` command handler

use std::io::Write;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use logsift_core::config::SiftConfig;
use logsift_core::types::{FIELD_MESSAGE, FIELD_RECEIVED_TIME};
use logsift_indexer::{SearchHit, SearchParams, SearchResults};

use crate::cli::SearchArgs;
use crate::commands::{query_text, searcher, time_window};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `search` command.
pub async fn execute(
    args: SearchArgs,
    config: &SiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let window = time_window(&args.window, Utc::now())?;
    let searcher = searcher(config, &args.log_type)?;
    let query = query_text(&args.query);
    let params = SearchParams {
        sort: args.sort,
        order: args.order,
        from: args.offset,
        size: args.size,
        highlight: !args.no_highlight,
    };

    let results = searcher.search(&query, &window, &params).await?;
    info!(
        log_type = %args.log_type,
        total = results.total,
        returned = results.hits.len(),
        "search complete"
    );

    writer.render(&SearchReport {
        query,
        offset: params.from,
        results,
    })
}

/// One page of search results.
#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub offset: usize,
    #[serde(flatten)]
    pub results: SearchResults,
}

impl Render for SearchReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let shown = self.results.hits.len();
        writeln!(
            w,
            "{} hits for {} (showing {}-{})",
            self.results.total.to_string().bold(),
            self.query.bold(),
            if shown == 0 { 0 } else { self.offset + 1 },
            self.offset + shown
        )?;
        for hit in &self.results.hits {
            render_hit(w, hit)?;
        }
        Ok(())
    }
}

fn render_hit(w: &mut dyn Write, hit: &SearchHit) -> std::io::Result<()> {
    use colored::Colorize;

    let field = |name: &str| {
        hit.source
            .as_ref()
            .and_then(|s| s.get(name))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned()
    };

    writeln!(w)?;
    writeln!(
        w,
        "{}  {}  {}",
        field(FIELD_RECEIVED_TIME).cyan(),
        hit.index.dimmed(),
        hit.locator.as_deref().unwrap_or("-")
    )?;
    let message = field(FIELD_MESSAGE);
    if !message.is_empty() {
        writeln!(w, "  {message}")?;
    }
    let mut fields: Vec<_> = hit.highlight.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (name, fragments) in fields {
        for fragment in fragments {
            writeln!(w, "  {}: {}", name.yellow(), fragment)?;
        }
    }
    Ok(())
}
