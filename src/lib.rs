pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod report;
pub mod shutdown;
