//! Runs user code as a local child process (`python3` / `node`).
//!
//! This is not a sandbox: the program runs with the server's privileges.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::types::{ExecutionOutput, ExecutionResult, Language, OutputStream};
use super::{CodeExecutor, OutputSink};
use crate::core::config::settings::ExecutionSettings;

const PIPE_DRAIN_AFTER_KILL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct LocalProcessExecutor {
    settings: ExecutionSettings,
}

enum RunOutcome {
    Finished {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    TimedOut {
        stdout: String,
    },
}

impl LocalProcessExecutor {
    pub fn new(settings: ExecutionSettings) -> Self {
        Self { settings }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    fn program(&self, language: Language) -> &str {
        match language {
            Language::Python => &self.settings.python_command,
            Language::Javascript => &self.settings.node_command,
        }
    }

    async fn run(
        &self,
        code: &str,
        language: Language,
        output: Option<OutputSink>,
    ) -> Result<RunOutcome, String> {
        let script = tempfile::Builder::new()
            .prefix("user_code")
            .suffix(language.file_extension())
            .tempfile()
            .map_err(|e| format!("Failed to create script file: {}", e))?;
        tokio::fs::write(script.path(), code)
            .await
            .map_err(|e| format!("Failed to write script file: {}", e))?;

        let program = self.program(language);
        let mut child = Command::new(program)
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", program, e))?;

        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(collect_lines(pipe, OutputStream::Stdout, output.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(collect_lines(pipe, OutputStream::Stderr, output)));

        let waited = tokio::time::timeout(self.timeout(), child.wait()).await;
        // Grandchildren may still hold the pipes open after a kill.
        let drain_limit = if waited.is_err() {
            let _ = child.kill().await;
            PIPE_DRAIN_AFTER_KILL
        } else {
            self.timeout()
        };

        let stdout = join_output(stdout_task, drain_limit).await;
        let stderr = join_output(stderr_task, drain_limit).await;

        match waited {
            Ok(Ok(status)) => Ok(RunOutcome::Finished {
                stdout,
                stderr,
                // Killed by a signal: no code, report as a failure.
                exit_code: status.code().unwrap_or(-1),
            }),
            Ok(Err(err)) => Err(format!("Failed to wait for {}: {}", program, err)),
            Err(_) => Ok(RunOutcome::TimedOut { stdout }),
        }
    }
}

#[async_trait]
impl CodeExecutor for LocalProcessExecutor {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        output: Option<OutputSink>,
    ) -> ExecutionResult {
        let started = Instant::now();

        match self.run(code, language, output).await {
            Ok(RunOutcome::Finished {
                stdout,
                stderr,
                exit_code,
            }) => {
                tracing::info!(
                    "{} run finished with exit code {} in {:?}",
                    language,
                    exit_code,
                    started.elapsed()
                );
                ExecutionResult::finished(stdout, stderr, exit_code, started.elapsed())
            }
            Ok(RunOutcome::TimedOut { stdout }) => {
                tracing::warn!("{} run timed out after {:?}", language, self.timeout());
                ExecutionResult::timed_out(stdout, self.timeout())
            }
            Err(message) => {
                tracing::error!("Error executing code: {}", message);
                ExecutionResult::failed_to_run(message, started.elapsed())
            }
        }
    }
}

/// Reads the pipe to EOF. Bytes that are not UTF-8 are replaced rather than
/// ending the read, so the child never writes into a closed pipe.
async fn collect_lines<R>(pipe: R, stream: OutputStream, sink: Option<OutputSink>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buffer = String::new();
    let mut reader = BufReader::new(pipe);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("Failed to read {:?} of child process: {}", stream, err);
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                break;
            }
        }

        let mut line = String::from_utf8_lossy(&raw).into_owned();
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        line.push('\n');

        if let Some(sink) = &sink {
            let _ = sink.send(ExecutionOutput {
                stream,
                data: line.clone(),
            });
        }
        buffer.push_str(&line);
    }

    buffer
}

async fn join_output(task: Option<tokio::task::JoinHandle<String>>, limit: Duration) -> String {
    let Some(mut handle) = task else {
        return String::new();
    };
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}
