pub mod command;

use async_trait::async_trait;

use crate::batch::WorkItem;
use crate::error::JobFailure;

pub use command::CommandProcessor;

/// The operation performed once per work item.
///
/// Implementations must be safe to call concurrently: the runner invokes
/// `invoke` for every item at the same time.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    /// Process one item. An `Err` marks only this item as failed.
    async fn invoke(&self, item: &WorkItem) -> Result<(), JobFailure>;
}
