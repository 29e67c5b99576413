pub mod outcome;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};

use crate::error::{AppError, JobFailure, Result};
use crate::processor::Processor;

pub use outcome::{BatchResult, BatchStatus, JobOutcome, JobStatus, WorkItem};

/// Fans work items out to a processor, one task per item, and joins them all.
///
/// There is no concurrency cap and no timeout: every item is launched
/// immediately, and a processor that never returns keeps `run` waiting.
pub struct BatchRunner {
    processor: Arc<dyn Processor>,
}

impl BatchRunner {
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        Self { processor }
    }

    /// Process every item concurrently and return once all have finished.
    ///
    /// Item failures are recorded in the result. Only a failure of the
    /// runner's own tasks is returned as an error.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<BatchResult> {
        if items.is_empty() {
            tracing::info!("No items to process");
            return Ok(BatchResult::empty());
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Infrastructure(format!("No async runtime available: {e}")))?;

        let total = items.len();
        let started = Instant::now();
        tracing::info!(
            items = total,
            processor = %self.processor.name(),
            "Starting batch"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<JobOutcome>();
        let mut units = JoinSet::new();

        for item in items {
            let processor = Arc::clone(&self.processor);
            let tx = tx.clone();
            units.spawn_on(
                async move {
                    let outcome = execute(processor, item).await;
                    outcome.log();
                    // The receiver outlives every unit; a send error means the
                    // batch itself was dropped.
                    let _ = tx.send(outcome);
                },
                &handle,
            );
        }
        drop(tx);

        while let Some(joined) = units.join_next().await {
            if let Err(e) = joined {
                return Err(AppError::Infrastructure(format!(
                    "Batch unit did not complete: {e}"
                )));
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        if outcomes.len() != total {
            return Err(AppError::Infrastructure(format!(
                "Expected {total} outcomes, collected {}",
                outcomes.len()
            )));
        }

        let result = BatchResult::new(outcomes, started.elapsed());
        tracing::info!(
            items = total,
            failed = result.failure_count(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "Batch finished"
        );

        Ok(result)
    }
}

/// Run the processor for one item on its own task so a panic stays with the item.
async fn execute(processor: Arc<dyn Processor>, item: WorkItem) -> JobOutcome {
    let started = Instant::now();
    let task_item = item.clone();
    let task = tokio::spawn(async move { processor.invoke(&task_item).await });
    let _abort = AbortOnDrop(task.abort_handle());
    let joined = task.await;

    let result = match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(JobFailure::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(JobFailure::Other(format!("processor task cancelled: {e}"))),
    };

    JobOutcome::new(item, result, started.elapsed())
}

/// Aborts the processor task if its unit is torn down first.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
