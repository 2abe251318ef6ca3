//! Outcome of a single command execution.

use chrono::{DateTime, Utc};

use crate::command::ParsedOutput;

/// Structured result of one successful tool run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionResult {
    /// Wall-clock time taken immediately before the tool was launched
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub source_query: Option<String>,
    pub elapsed_ms: u64,
    pub documents_searched: u64,
    pub hits: u64,
    /// Combined stdout/stderr of the tool
    pub raw_output: String,
    /// True when the hit-count pattern did not match and `hits`/`documents_searched` are defaults
    pub hits_defaulted: bool,
    /// True when the elapsed-time pattern did not match and `elapsed_ms` is the sentinel
    pub elapsed_defaulted: bool,
}

impl ExecutionResult {
    pub fn new(
        timestamp: DateTime<Utc>,
        query: String,
        source_query: Option<String>,
        parsed: ParsedOutput,
        raw_output: String,
    ) -> Self {
        Self {
            timestamp,
            query,
            source_query,
            elapsed_ms: parsed.elapsed_ms,
            documents_searched: parsed.documents_searched,
            hits: parsed.hits,
            raw_output,
            hits_defaulted: parsed.hits_defaulted,
            elapsed_defaulted: parsed.elapsed_defaulted,
        }
    }

    /// Whether any value was filled in from a default instead of the tool output.
    pub fn is_defaulted(&self) -> bool {
        self.hits_defaulted || self.elapsed_defaulted
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("process {argv:?} exited with status {status}")]
    ProcessExecution {
        argv: Vec<String>,
        status: i32,
        output: String,
    },
    #[error("failed to launch {program}: {message}")]
    Launch { program: String, message: String },
}

impl CommandError {
    /// Captured tool output, if the process got far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::ProcessExecution { output, .. } => Some(output),
            Self::Launch { .. } => None,
        }
    }
}

/// A failed work item, kept with enough context to appear in a report.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("query {query:?} failed: {cause}")]
pub struct ExecutionError {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub source_query: Option<String>,
    #[source]
    pub cause: CommandError,
}

/// Per-work-item value collected by the scheduler. Failures are data, not panics.
pub type Outcome = Result<ExecutionResult, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_message_names_query_and_status() {
        let err = ExecutionError {
            timestamp: Utc::now(),
            query: "apple".into(),
            source_query: None,
            cause: CommandError::ProcessExecution {
                argv: vec!["rcvdk".into(), "-locale".into()],
                status: 3,
                output: "boom".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("apple"));
        assert!(msg.contains("status 3"));
        assert_eq!(err.cause.output(), Some("boom"));
    }
}
