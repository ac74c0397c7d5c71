//! `logsift export` command handler
//!
//! Walks the full result set with a scroll cursor and writes one document per line.

use std::io::Write;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::info;

use logsift_core::config::SiftConfig;
use logsift_indexer::{RawHit, ScrollConsumer, SearchBackend};

use crate::cli::ExportArgs;
use crate::commands::{query_text, searcher, time_window};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `export` command.
pub async fn execute(
    args: ExportArgs,
    config: &SiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let window = time_window(&args.window, Utc::now())?;
    let searcher = searcher(config, &args.log_type)?;
    let query = query_text(&args.query);
    let mut scroll = searcher.export(&query, &window, args.page_size);
    let started = Instant::now();

    let (written, destination) = match &args.out {
        Some(path) => {
            let file = tokio::fs::File::create(path).await?;
            let written = write_ndjson(&mut scroll, BufWriter::new(file)).await?;
            (written, path.display().to_string())
        }
        None => {
            let written = write_ndjson(&mut scroll, BufWriter::new(tokio::io::stdout())).await?;
            (written, "stdout".to_owned())
        }
    };

    let report = ExportReport {
        query,
        destination,
        documents: written,
        total: scroll.total().unwrap_or(0),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        log_type = %args.log_type,
        documents = report.documents,
        elapsed_ms = report.elapsed_ms,
        "export complete"
    );

    // stdout이 데이터 스트림이면 요약은 stderr로
    if args.out.is_some() {
        writer.render(&report)
    } else {
        writer.render_stderr(&report)
    }
}

/// Drain the scroll into `out`, one JSON document per line.
pub(crate) async fn write_ndjson<B, W>(
    scroll: &mut ScrollConsumer<B>,
    mut out: W,
) -> Result<u64, CliError>
where
    B: SearchBackend,
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(hits) = scroll.next_page().await? {
        for hit in hits {
            let mut line = serde_json::to_vec(&hit_document(hit))?;
            line.push(b'\n');
            out.write_all(&line).await?;
            written += 1;
        }
    }
    out.flush().await?;
    Ok(written)
}

/// The stored document, or its location when the backend returned no source.
fn hit_document(hit: RawHit) -> serde_json::Value {
    hit.source
        .unwrap_or_else(|| json!({ "_index": hit.index, "_id": hit.id }))
}

/// Export summary.
#[derive(Debug, Serialize)]
pub struct ExportReport {
    pub query: String,
    pub destination: String,
    pub documents: u64,
    /// Total reported by the backend when the cursor opened
    pub total: u64,
    pub elapsed_ms: u64,
}

impl Render for ExportReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Exported {} of {} documents to {} in {}ms",
            self.documents.to_string().green().bold(),
            self.total,
            self.destination,
            self.elapsed_ms
        )
    }
}
