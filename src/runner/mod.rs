//! Process execution boundary: trait, types, and the system implementation.

pub mod mock;

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::{Command, Stdio};

use tracing::debug;

/// Captured result of one external process run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Interleaved stdout and stderr
    pub output: Vec<u8>,
    /// Exit status; -1 when the process was terminated by a signal
    pub status: i32,
}

impl ProcessOutput {
    pub fn new(output: impl Into<Vec<u8>>, status: i32) -> Self {
        Self {
            output: output.into(),
            status,
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunnerError {
    #[error("empty command line")]
    EmptyArgv,
    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Runs an external program with the given arguments and input.
///
/// `argv[0]` is the program. Implementations must be shareable across worker
/// threads.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, argv: &[String], stdin: &[u8]) -> Result<ProcessOutput, RunnerError>;
}

/// Spawns real processes through `std::process::Command`.
///
/// stdout and stderr go to the same anonymous temporary file so their
/// interleaving is preserved.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, argv: &[String], stdin: &[u8]) -> Result<ProcessOutput, RunnerError> {
        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyArgv)?;

        let mut capture = tempfile::tempfile()?;
        let stdout = capture.try_clone()?;
        let stderr = capture.try_clone()?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(mut pipe) = child.stdin.take() {
            // The tool may quit before consuming the whole script.
            if let Err(e) = pipe.write_all(stdin) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
        }

        let status = child.wait()?;
        capture.seek(SeekFrom::Start(0))?;
        let mut output = Vec::new();
        capture.read_to_end(&mut output)?;

        debug!(program = %program, status = ?status.code(), bytes = output.len(), "Process finished");
        Ok(ProcessOutput {
            output,
            status: status.code().unwrap_or(-1),
        })
    }
}
