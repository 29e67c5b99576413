use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::batch::WorkItem;
use crate::config::ProcessorConfig;
use crate::error::{AppError, JobFailure, Result};
use crate::processor::Processor;

const ITEM_PLACEHOLDER: &str = "{}";

/// Runs an external program once per item and judges it by exit status.
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    stderr_tail_lines: usize,
}

impl CommandProcessor {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        let program = config.program.trim();
        if program.is_empty() {
            return Err(AppError::Config("processor program is empty".to_string()));
        }

        Ok(Self {
            program: program.to_string(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            stderr_tail_lines: config.stderr_tail_lines,
        })
    }

    /// Argument list for one item: placeholders are substituted, or the item
    /// goes last when no argument carries a placeholder.
    fn build_args(&self, item: &WorkItem) -> Vec<String> {
        if self.args.iter().any(|a| a.contains(ITEM_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(ITEM_PLACEHOLDER, item.as_str()))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(item.as_str().to_string());
            args
        }
    }
}

/// Drain `reader` to EOF, keeping only its last `limit` lines.
/// Invalid UTF-8 is replaced rather than treated as an error.
async fn read_tail<R: AsyncRead + Unpin>(reader: R, limit: usize) -> String {
    let mut reader = BufReader::new(reader);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(limit);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if limit == 0 {
                    continue;
                }
                if tail.len() == limit {
                    tail.pop_front();
                }
                tail.push_back(String::from_utf8_lossy(&line).trim_end().to_string());
            }
        }
    }

    Vec::from(tail).join("\n").trim().to_string()
}

#[async_trait]
impl Processor for CommandProcessor {
    fn name(&self) -> &str {
        &self.program
    }

    async fn invoke(&self, item: &WorkItem) -> std::result::Result<(), JobFailure> {
        let args = self.build_args(item);

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(item = %item, program = %self.program, args = ?args, "Launching processor");

        let mut child = command
            .spawn()
            .map_err(|e| JobFailure::Launch(format!("{}: {e}", self.program)))?;

        let stderr = child.stderr.take();
        let tail_lines = self.stderr_tail_lines;
        let stderr_tail = async move {
            match stderr {
                Some(stderr) => read_tail(stderr, tail_lines).await,
                None => String::new(),
            }
        };

        let (status, stderr) = tokio::join!(child.wait(), stderr_tail);
        let status = status
            .map_err(|e| JobFailure::Other(format!("waiting for {}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(JobFailure::Exit {
                code: status.code(),
                stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(program: &str, args: &[&str]) -> CommandProcessor {
        let config = ProcessorConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..ProcessorConfig::default()
        };
        CommandProcessor::new(&config).unwrap()
    }

    #[test]
    fn test_rejects_empty_program() {
        let config = ProcessorConfig {
            program: "  ".to_string(),
            ..ProcessorConfig::default()
        };
        assert!(matches!(
            CommandProcessor::new(&config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_item_appended_without_placeholder() {
        let p = processor("strun", &["romancal.pipeline"]);
        assert_eq!(
            p.build_args(&WorkItem::from("a.asdf")),
            vec!["romancal.pipeline", "a.asdf"]
        );
    }

    #[test]
    fn test_placeholder_substituted() {
        let p = processor("convert", &["--in", "{}", "--out", "{}.out"]);
        assert_eq!(
            p.build_args(&WorkItem::from("a.txt")),
            vec!["--in", "a.txt", "--out", "a.txt.out"]
        );
    }

    #[tokio::test]
    async fn test_read_tail_keeps_last_lines() {
        assert_eq!(read_tail(&b"one\ntwo\nthree\n"[..], 2).await, "two\nthree");
        assert_eq!(read_tail(&b"one\ntwo"[..], 5).await, "one\ntwo");
        assert_eq!(read_tail(&b"one\ntwo\n"[..], 0).await, "");
        assert_eq!(read_tail(&b""[..], 3).await, "");
    }

    #[tokio::test]
    async fn test_read_tail_tolerates_invalid_utf8() {
        assert_eq!(read_tail(&b"\xff\xfe\nlast\n"[..], 1).await, "last");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chatty_stderr_is_bounded_to_tail() {
        let mut p = processor(
            "sh",
            &["-c", "i=0; while [ $i -lt 5000 ]; do echo \"noise $i\" >&2; i=$((i+1)); done; exit 1"],
        );
        p.stderr_tail_lines = 2;
        let err = p.invoke(&WorkItem::from("a.txt")).await.unwrap_err();
        assert_eq!(
            err,
            JobFailure::Exit {
                code: Some(1),
                stderr: "noise 4998\nnoise 4999".to_string(),
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let p = processor("sh", &["-c", "test -n \"$0\""]);
        assert!(p.invoke(&WorkItem::from("a.txt")).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_captures_code_and_stderr() {
        let p = processor("sh", &["-c", "echo \"cannot read $0\" >&2; exit 3"]);
        let err = p.invoke(&WorkItem::from("b.txt")).await.unwrap_err();
        assert_eq!(
            err,
            JobFailure::Exit {
                code: Some(3),
                stderr: "cannot read b.txt".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let p = processor("batchrun-no-such-program", &[]);
        let err = p.invoke(&WorkItem::from("a.txt")).await.unwrap_err();
        assert!(matches!(err, JobFailure::Launch(_)));
    }
}
