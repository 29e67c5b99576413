use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessorConfig {
    /// Program invoked once per work item. Must be set by file, env or CLI.
    #[serde(default)]
    pub program: String,
    /// Arguments; `{}` is replaced by the item, otherwise the item is appended.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            working_dir: None,
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BatchConfig {
    #[serde(default)]
    pub empty_batch: EmptyBatchStatus,
}

/// Overall status reported when the batch has no items at all.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBatchStatus {
    #[default]
    Succeeded,
    Failed,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReportConfig {
    #[serde(default)]
    pub summary: SummaryFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Append log lines to this file in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_stderr_tail_lines() -> usize {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, environment())
    }

    fn load_with_env(config_path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("batchrun").required(false));
        }

        builder = builder.add_source(env);

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Fail early on settings the runner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.processor.program.trim().is_empty() {
            return Err(AppError::Config(
                "processor.program is not set (use --exec, the config file or BATCHRUN__PROCESSOR__PROGRAM)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Environment variable overrides with BATCHRUN__ prefix.
///
/// `processor.args` is split on spaces, e.g.
/// `BATCHRUN__PROCESSOR__ARGS="romancal.pipeline {}"`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("BATCHRUN")
        .separator("__")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("processor.args")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.processor.stderr_tail_lines, 20);
        assert_eq!(config.batch.empty_batch, EmptyBatchStatus::Succeeded);
        assert_eq!(config.report.summary, SummaryFormat::Text);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[processor]
program = "strun"
args = ["romancal.pipeline", "{{}}"]

[batch]
empty_batch = "failed"

[report]
summary = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.processor.program, "strun");
        assert_eq!(config.processor.args, vec!["romancal.pipeline", "{}"]);
        assert_eq!(config.processor.stderr_tail_lines, 20);
        assert_eq!(config.batch.empty_batch, EmptyBatchStatus::Failed);
        assert_eq!(config.report.summary, SummaryFormat::Json);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    fn env_source(vars: &[(&str, &str)]) -> config::Environment {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    #[test]
    fn test_env_overrides_file_including_args_list() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[processor]
program = "echo"
args = ["from-file"]
stderr_tail_lines = 5
"#
        )
        .unwrap();

        let env = env_source(&[
            ("BATCHRUN__PROCESSOR__PROGRAM", "strun"),
            ("BATCHRUN__PROCESSOR__ARGS", "romancal.pipeline {}"),
            ("BATCHRUN__BATCH__EMPTY_BATCH", "failed"),
        ]);
        let config = AppConfig::load_with_env(file.path().to_str(), env).unwrap();

        assert_eq!(config.processor.program, "strun");
        assert_eq!(config.processor.args, vec!["romancal.pipeline", "{}"]);
        assert_eq!(config.processor.stderr_tail_lines, 5);
        assert_eq!(config.batch.empty_batch, EmptyBatchStatus::Failed);
    }

    #[test]
    fn test_single_env_arg_is_a_list() {
        let env = env_source(&[
            ("BATCHRUN__PROCESSOR__PROGRAM", "gzip"),
            ("BATCHRUN__PROCESSOR__ARGS", "-k"),
        ]);
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[batch]").unwrap();
        let config = AppConfig::load_with_env(file.path().to_str(), env).unwrap();
        assert_eq!(config.processor.args, vec!["-k"]);
    }

    #[test]
    fn test_missing_required_file_is_config_error() {
        let err = AppConfig::load(Some("/nonexistent/batchrun-config")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_missing_program() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
