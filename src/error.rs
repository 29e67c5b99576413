use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runner infrastructure failure: {0}")]
    Infrastructure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Why a single work item failed. Recorded in its outcome, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobFailure {
    #[error("failed to launch processor: {0}")]
    Launch(String),

    #[error("{}", describe_exit(.code, .stderr))]
    Exit { code: Option<i32>, stderr: String },

    #[error("processor panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

fn describe_exit(code: &Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    };
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}
