use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::EmptyBatchStatus;
use crate::error::JobFailure;

/// One unit of input work. The token is handed to the processor verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkItem {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for WorkItem {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed(JobFailure),
}

/// The single outcome recorded for a work item once its invocation finishes.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub item: WorkItem,
    pub status: JobStatus,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn new(item: WorkItem, result: Result<(), JobFailure>, duration: Duration) -> Self {
        let status = match result {
            Ok(()) => JobStatus::Succeeded,
            Err(failure) => JobStatus::Failed(failure),
        };
        Self {
            item,
            status,
            duration,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded)
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.status {
            JobStatus::Succeeded => None,
            JobStatus::Failed(failure) => Some(failure),
        }
    }

    /// Emit the per-item diagnostic at completion time.
    pub(crate) fn log(&self) {
        let duration_ms = self.duration.as_millis() as u64;
        match &self.status {
            JobStatus::Succeeded => {
                tracing::info!(item = %self.item, duration_ms, "Item succeeded");
            }
            JobStatus::Failed(failure) => {
                tracing::error!(
                    item = %self.item,
                    duration_ms,
                    reason = %failure,
                    "Item failed"
                );
            }
        }
    }
}

/// Overall verdict of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Succeeded,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Every outcome of one batch, in completion order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    outcomes: Vec<JobOutcome>,
    elapsed: Duration,
}

impl BatchResult {
    pub(crate) fn new(outcomes: Vec<JobOutcome>, elapsed: Duration) -> Self {
        Self { outcomes, elapsed }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Wall-clock time from the first launch to the join barrier releasing.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn status(&self, empty_batch: EmptyBatchStatus) -> BatchStatus {
        if self.outcomes.is_empty() {
            return match empty_batch {
                EmptyBatchStatus::Succeeded => BatchStatus::Succeeded,
                EmptyBatchStatus::Failed => BatchStatus::Failed,
            };
        }
        if self.failure_count() == 0 {
            BatchStatus::Succeeded
        } else {
            BatchStatus::Failed
        }
    }
}
