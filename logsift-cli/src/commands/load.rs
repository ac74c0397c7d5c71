//! `logsift load` command handler
//!
//! Reads normalized documents as NDJSON, indexes them into a fresh generation
//! and points the log type's alias at it once everything is flushed.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use logsift_core::config::SiftConfig;
use logsift_core::error::ValidationError;
use logsift_core::types::LogDocument;
use logsift_indexer::schema::default_mapping;
use logsift_indexer::{
    BulkConfig, BulkIndexer, HttpBackend, ItemReceipt, LoadSummary, Locator, SearchBackend,
};

use crate::cli::LoadArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Item errors kept in the report
const MAX_ERROR_SAMPLES: usize = 10;

/// Execute the `load` command.
pub async fn execute(
    args: LoadArgs,
    config: &SiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let alias = config
        .log_type(&args.log_type)
        .map_err(|e| CliError::Config(e.to_string()))?
        .alias
        .clone();
    let mapping = match &args.mapping {
        Some(path) => read_mapping(path).await?,
        None => default_mapping(),
    };
    // open the input before creating the generation index
    let reader: Box<dyn AsyncBufRead + Unpin> = if args.input == Path::new("-") {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        Box::new(BufReader::new(tokio::fs::File::open(&args.input).await?))
    };

    let backend = HttpBackend::new(&config.backend).map_err(|e| CliError::Backend(e.to_string()))?;
    let mut indexer = BulkIndexer::new(
        Arc::new(backend),
        alias,
        mapping,
        BulkConfig::from_core(config),
    )?;

    let index = indexer.start().await?.to_owned();
    info!(log_type = %args.log_type, index = %index, "bulk load started");

    let (summary, outcome) = load_lines(&mut indexer, reader).await?;
    let report = LoadReport::new(args.input.display().to_string(), summary, outcome);
    writer.render(&report)?;

    if report.failed > 0 {
        return Err(CliError::Command(format!(
            "{} of {} documents failed to index",
            report.failed, report.pushed
        )));
    }
    Ok(())
}

async fn read_mapping(path: &Path) -> Result<Value, CliError> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Input(format!("invalid mapping {}: {e}", path.display())))
}

/// Why an input line was not indexed.
#[derive(Debug, thiserror::Error)]
enum LineError {
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Locator(#[from] ValidationError),
}

#[derive(Debug, Default)]
struct PushOutcome {
    skipped: u64,
    assigned: u64,
    errors: Vec<String>,
}

impl PushOutcome {
    fn sample(&mut self, error: String) {
        if self.errors.len() < MAX_ERROR_SAMPLES {
            self.errors.push(error);
        }
    }
}

/// Push every line of `reader` into a started indexer and finalize it.
///
/// If reading or finalizing fails, the half-built generation is deleted before
/// the error is returned.
async fn load_lines<B, R>(
    indexer: &mut BulkIndexer<B>,
    reader: R,
) -> Result<(LoadSummary, PushOutcome), CliError>
where
    B: SearchBackend,
    R: AsyncBufRead + Unpin,
{
    let (receipts, collector) = spawn_error_collector();

    let mut outcome = match push_lines(indexer, reader, &receipts).await {
        Ok(outcome) => outcome,
        Err(e) => {
            discard(indexer).await;
            return Err(e);
        }
    };
    let summary = match indexer.end().await {
        Ok(summary) => summary,
        Err(e) => {
            discard(indexer).await;
            return Err(e.into());
        }
    };

    drop(receipts);
    let item_errors = collector
        .await
        .map_err(|e| CliError::Command(format!("receipt collector failed: {e}")))?;
    for error in item_errors {
        outcome.sample(error);
    }
    Ok((summary, outcome))
}

async fn discard<B: SearchBackend>(indexer: &mut BulkIndexer<B>) {
    let index = indexer.index().unwrap_or_default().to_owned();
    if let Err(e) = indexer.abort().await {
        warn!(index = %index, error = %e, "failed to delete partially loaded index");
    }
}

/// Await item receipts as they are pushed, keeping a few error samples.
fn spawn_error_collector() -> (mpsc::UnboundedSender<ItemReceipt>, JoinHandle<Vec<String>>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ItemReceipt>();
    let handle = tokio::spawn(async move {
        let mut errors = Vec::new();
        while let Some(receipt) = rx.recv().await {
            if let Err(e) = receipt.await {
                if errors.len() < MAX_ERROR_SAMPLES {
                    errors.push(e.to_string());
                }
            }
        }
        errors
    });
    (tx, handle)
}

async fn push_lines<B, R>(
    indexer: &mut BulkIndexer<B>,
    reader: R,
    receipts: &mpsc::UnboundedSender<ItemReceipt>,
) -> Result<PushOutcome, CliError>
where
    B: SearchBackend,
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut outcome = PushOutcome::default();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match prepare_document(&line) {
            Ok(None) => {}
            Ok(Some((doc, assigned))) => {
                if assigned {
                    outcome.assigned += 1;
                }
                receipts
                    .send(indexer.push_document(&doc)?)
                    .map_err(|_| CliError::Command("receipt collector stopped".to_owned()))?;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping document");
                outcome.skipped += 1;
                outcome.sample(format!("line {line_no}: {e}"));
            }
        }
    }
    Ok(outcome)
}

/// Parse one NDJSON line into a document ready for indexing.
///
/// Blank lines yield `None`. A missing `recordFinder` is replaced with a random
/// UUID (the flag in the result is `true`), and `all` is recomputed. Documents
/// whose finder cannot form a permalink are rejected.
fn prepare_document(line: &str) -> Result<Option<(LogDocument, bool)>, LineError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut doc: LogDocument = serde_json::from_str(line)?;
    let assigned = doc.record_finder.is_empty();
    if assigned {
        doc.record_finder = uuid::Uuid::new_v4().to_string();
    }
    Locator::from_document(&doc)?;
    doc.fan_out();
    Ok(Some((doc, assigned)))
}

/// Bulk load report.
#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub input: String,
    pub index: String,
    pub alias: String,
    /// Generations removed from the alias
    pub replaced: Vec<String>,
    pub pushed: u64,
    pub indexed: u64,
    pub failed: u64,
    pub retried: u64,
    /// Lines that were not indexable documents
    pub skipped: u64,
    /// Documents that got a generated `recordFinder`
    pub assigned_finders: u64,
    pub elapsed_ms: u64,
    /// First few line and item errors
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl LoadReport {
    fn new(input: String, summary: LoadSummary, outcome: PushOutcome) -> Self {
        Self {
            input,
            index: summary.index,
            alias: summary.alias,
            replaced: summary.replaced,
            pushed: summary.pushed,
            indexed: summary.indexed,
            failed: summary.failed,
            retried: summary.retried,
            skipped: outcome.skipped,
            assigned_finders: outcome.assigned,
            elapsed_ms: summary.elapsed.as_millis() as u64,
            errors: outcome.errors,
        }
    }
}

impl Render for LoadReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Load: {} -> {}", self.input.bold(), self.index.bold())?;
        writeln!(w, "  Alias:    {}", self.alias)?;
        if !self.replaced.is_empty() {
            writeln!(w, "  Replaced: {}", self.replaced.join(", "))?;
        }
        writeln!(w, "  Indexed:  {}", self.indexed.to_string().green())?;
        if self.failed > 0 {
            writeln!(w, "  Failed:   {}", self.failed.to_string().red())?;
        }
        if self.retried > 0 {
            writeln!(w, "  Retried:  {}", self.retried)?;
        }
        if self.skipped > 0 {
            writeln!(w, "  Skipped:  {}", self.skipped.to_string().yellow())?;
        }
        writeln!(w, "  Elapsed:  {}ms", self.elapsed_ms)?;
        for err in &self.errors {
            writeln!(w, "  Error: {}", err.red())?;
        }
        Ok(())
    }
}
