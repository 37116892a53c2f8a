use thiserror::Error;

/// A line that could not be decoded into JSON object records.
///
/// `payload` is the trimmed offending text cut to
/// [`crate::PARSE_FAILURE_SAMPLE_CHARS`] characters.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{context}: {reason}")]
pub struct MalformedLineError {
    pub context: String,
    pub reason: String,
    pub payload: String,
}

/// Failure of a whole execution: either the executor itself (missing binary, spawn,
/// timeout, ...) or a malformed line under a fail-fast policy.
#[derive(Debug, Error)]
pub enum ExecutionError<E>
where
    E: std::error::Error + 'static,
{
    #[error("agent process execution failed: {0}")]
    Executor(#[source] E),
    #[error(transparent)]
    MalformedLine(#[from] MalformedLineError),
}

impl<E> ExecutionError<E>
where
    E: std::error::Error + 'static,
{
    pub fn is_malformed_line(&self) -> bool {
        matches!(self, Self::MalformedLine(_))
    }
}
