//! In-process runner for tests and dry runs: canned responses, recorded calls.

use super::{ProcessOutput, ProcessRunner, RunnerError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

type Responder = dyn Fn(&[String], &[u8]) -> ProcessOutput + Send + Sync + 'static;

/// One recorded call to [`MockRunner::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub stdin: Vec<u8>,
}

impl Invocation {
    pub fn stdin_text(&self) -> String {
        String::from_utf8_lossy(&self.stdin).into_owned()
    }
}

pub struct MockRunner {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    /// Every call succeeds with the same output.
    pub fn canned(output: impl Into<String>) -> Self {
        let output = output.into();
        Self::from_fn(move |_, _| ProcessOutput::new(output.clone(), 0))
    }

    /// Every call exits with `status` and the given output.
    pub fn failing(status: i32, output: impl Into<String>) -> Self {
        let output = output.into();
        Self::from_fn(move |_, _| ProcessOutput::new(output.clone(), status))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&[String], &[u8]) -> ProcessOutput + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long inside every call, to simulate a slow tool.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, argv: &[String], stdin: &[u8]) -> Result<ProcessOutput, RunnerError> {
        if argv.is_empty() {
            return Err(RunnerError::EmptyArgv);
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Invocation {
                argv: argv.to_vec(),
                stdin: stdin.to_vec(),
            });
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok((self.responder)(argv, stdin))
    }
}
