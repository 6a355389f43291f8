use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Language::Python => ".py",
            Language::Javascript => ".js",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "javascript" => Ok(Language::Javascript),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one code run. Produced once by an executor and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock seconds.
    pub execution_time: f64,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// A run that exited on its own; non-zero exit codes count as errors.
    pub fn finished(stdout: String, stderr: String, exit_code: i32, elapsed: Duration) -> Self {
        let failed = exit_code != 0;
        Self {
            status: if failed {
                ExecutionStatus::Error
            } else {
                ExecutionStatus::Success
            },
            error_message: failed.then(|| stderr.clone()),
            stdout,
            stderr,
            execution_time: elapsed.as_secs_f64(),
            exit_code: Some(exit_code),
        }
    }

    pub fn timed_out(stdout: String, limit: Duration) -> Self {
        Self {
            status: ExecutionStatus::Timeout,
            stdout,
            stderr: "Execution timed out".to_string(),
            execution_time: limit.as_secs_f64(),
            exit_code: None,
            error_message: Some("Code execution timed out".to_string()),
        }
    }

    /// The program could not be run at all.
    pub fn failed_to_run(message: impl Into<String>, elapsed: Duration) -> Self {
        let message = message.into();
        Self {
            status: ExecutionStatus::Error,
            stdout: String::new(),
            stderr: message.clone(),
            execution_time: elapsed.as_secs_f64(),
            exit_code: None,
            error_message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of live output, forwarded while the program runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    #[serde(rename = "type")]
    pub stream: OutputStream,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_parsing_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert_eq!(" javascript ".parse::<Language>(), Ok(Language::Javascript));
        assert_eq!(
            "ruby".parse::<Language>(),
            Err(UnsupportedLanguage("ruby".to_string()))
        );
    }

    #[test]
    fn non_zero_exit_is_an_error_with_stderr_message() {
        let result = ExecutionResult::finished(
            String::new(),
            "NameError: x".to_string(),
            1,
            Duration::from_millis(250),
        );
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error_message.as_deref(), Some("NameError: x"));
        assert_eq!(result.exit_code, Some(1));

        let ok = ExecutionResult::finished("hi\n".to_string(), String::new(), 0, Duration::ZERO);
        assert_eq!(ok.status, ExecutionStatus::Success);
        assert!(ok.error_message.is_none());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let result = ExecutionResult::timed_out("partial".to_string(), Duration::from_secs(30));
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(
            value,
            json!({
                "status": "timeout",
                "stdout": "partial",
                "stderr": "Execution timed out",
                "execution_time": 30.0,
                "exit_code": null,
                "error_message": "Code execution timed out"
            })
        );
    }

    #[test]
    fn output_lines_are_tagged_by_stream() {
        let line = ExecutionOutput {
            stream: OutputStream::Stderr,
            data: "boom\n".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&line).expect("serialize"),
            json!({ "type": "stderr", "data": "boom\n" })
        );
    }
}
