use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use batchrun::batch::{BatchRunner, WorkItem};
use batchrun::config::{AppConfig, LogFormat, SummaryFormat};
use batchrun::processor::CommandProcessor;
use batchrun::report;
use batchrun::shutdown::wait_for_shutdown;

#[derive(Parser, Debug)]
#[command(
    name = "batchrun",
    about = "Run one external command per item concurrently and report failures"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Program to run for each item
    #[arg(short = 'x', long = "exec")]
    program: Option<String>,

    /// Argument passed to the program (repeatable); `{}` is replaced by the item
    #[arg(short = 'a', long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Format of the final summary
    #[arg(long, value_enum)]
    summary: Option<SummaryFormat>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Items to process, one invocation each
    items: Vec<String>,
}

impl Cli {
    /// Command-line flags win over file and environment settings.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(program) = &self.program {
            config.processor.program = program.clone();
        }
        if !self.args.is_empty() {
            config.processor.args = self.args.clone();
        }
        if let Some(summary) = self.summary {
            config.report.summary = summary;
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("batchrun: {e:#}");
            ExitCode::from(report::EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    batchrun::logging::init(&config.logging).context("initializing logging")?;

    let processor = Arc::new(CommandProcessor::new(&config.processor)?);
    let runner = BatchRunner::new(processor);
    let items: Vec<WorkItem> = cli.items.into_iter().map(WorkItem::from).collect();

    let result = tokio::select! {
        result = runner.run(items) => result?,
        _ = wait_for_shutdown() => {
            return Ok(ExitCode::from(report::EXIT_INTERRUPTED));
        }
    };

    let status = result.status(config.batch.empty_batch);
    let summary = report::render(&result, config.batch.empty_batch, config.report.summary)
        .context("rendering summary")?;
    println!("{summary}");

    Ok(ExitCode::from(report::exit_code(status)))
}
