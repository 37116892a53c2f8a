use std::{path::PathBuf, time::Duration};

use agent_events::ExecutionError;
use thiserror::Error;

/// Failures of the process itself, as opposed to its output.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("agent binary not found: {binary:?}")]
    MissingBinary { binary: PathBuf },
    #[error("failed to spawn agent process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("agent process timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("failed waiting for agent process: {0}")]
    Wait(std::io::Error),
    #[error("failed reading stdout: {0}")]
    StdoutRead(std::io::Error),
    #[error("failed reading stderr: {0}")]
    StderrRead(std::io::Error),
    #[error("failed writing stdin: {0}")]
    StdinWrite(std::io::Error),
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("internal error: missing stderr pipe")]
    MissingStderr,
    #[error("internal error: join failure: {0}")]
    Join(String),
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Either the process failed or its output had a malformed line.
pub type RunError = ExecutionError<ExecError>;
