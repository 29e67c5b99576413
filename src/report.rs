use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::{BatchResult, BatchStatus, JobOutcome};
use crate::config::{EmptyBatchStatus, SummaryFormat};

/// Process exit code when at least one item failed.
pub const EXIT_BATCH_FAILED: u8 = 1;
/// Process exit code for configuration or runner infrastructure errors.
pub const EXIT_FATAL: u8 = 2;
/// Process exit code after SIGINT/SIGTERM.
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn exit_code(status: BatchStatus) -> u8 {
    match status {
        BatchStatus::Succeeded => 0,
        BatchStatus::Failed => EXIT_BATCH_FAILED,
    }
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    status: &'static str,
    total: usize,
    succeeded: usize,
    failed: usize,
    elapsed_ms: u64,
    outcomes: Vec<OutcomeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct OutcomeEntry<'a> {
    item: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    duration_ms: u64,
    finished_at: DateTime<Utc>,
}

impl<'a> From<&'a JobOutcome> for OutcomeEntry<'a> {
    fn from(outcome: &'a JobOutcome) -> Self {
        Self {
            item: outcome.item.as_str(),
            status: if outcome.is_success() { "succeeded" } else { "failed" },
            reason: outcome.failure().map(|f| f.to_string()),
            duration_ms: outcome.duration.as_millis() as u64,
            finished_at: outcome.finished_at,
        }
    }
}

/// Render the end-of-batch summary written to stdout.
pub fn render(
    result: &BatchResult,
    empty_batch: EmptyBatchStatus,
    format: SummaryFormat,
) -> serde_json::Result<String> {
    match format {
        SummaryFormat::Text => Ok(render_text(result)),
        SummaryFormat::Json => render_json(result, empty_batch),
    }
}

fn render_text(result: &BatchResult) -> String {
    let mut out = String::new();
    for outcome in result.failed() {
        let reason = outcome
            .failure()
            .map(|f| f.to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "FAILED {}: {reason}", outcome.item);
    }
    let _ = write!(
        out,
        "{} items, {} succeeded, {} failed in {}ms",
        result.len(),
        result.len() - result.failure_count(),
        result.failure_count(),
        result.elapsed().as_millis()
    );
    out
}

fn render_json(result: &BatchResult, empty_batch: EmptyBatchStatus) -> serde_json::Result<String> {
    let failed = result.failure_count();
    let summary = Summary {
        status: result.status(empty_batch).as_str(),
        total: result.len(),
        succeeded: result.len() - failed,
        failed,
        elapsed_ms: result.elapsed().as_millis() as u64,
        outcomes: result.outcomes().iter().map(OutcomeEntry::from).collect(),
    };
    serde_json::to_string_pretty(&summary)
}
