use std::convert::Infallible;

use tracing::debug;

use crate::config::ParsePolicy;
use crate::error::{ExecutionError, MalformedLineError};
use crate::fold::AgentGrammar;
use crate::live::LiveFolder;
use crate::parse::parse_output;
use crate::response::AgentResponse;
use crate::sink::StreamSink;

/// Which pipe a chunk was read from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Everything a finished process produced.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process ended without an exit status (e.g. killed by a signal).
    pub exit_code: i32,
}

/// Runs an agent process to completion, handing every chunk to `on_chunk` as it is read.
///
/// The returned [`ExecOutput`] is the full capture and may legitimately differ from the
/// concatenation of delivered chunks.
pub trait ProcessExecutor {
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(
        &mut self,
        on_chunk: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> Result<ExecOutput, Self::Error>;
}

/// One agent run: live notifications while chunks arrive, then the authoritative parse.
///
/// The live path is only built when the sink asks for live events.
pub struct Execution<'s, G: AgentGrammar> {
    policy: ParsePolicy,
    live: Option<LiveFolder<G>>,
    sink: &'s mut dyn StreamSink,
}

impl<'s, G: AgentGrammar> Execution<'s, G> {
    pub fn new(policy: ParsePolicy, sink: &'s mut dyn StreamSink) -> Self {
        let live = sink.wants_live_events().then(|| LiveFolder::new(policy));
        Self { policy, live, sink }
    }

    pub fn on_chunk(&mut self, stream: OutputStream, chunk: &[u8]) {
        if let Some(live) = self.live.as_mut() {
            live.consume(stream, chunk, &mut *self.sink);
        }
    }

    pub fn live(&self) -> Option<&LiveFolder<G>> {
        self.live.as_ref()
    }

    /// Flushes the live path, re-parses the full stdout and notifies completion once.
    pub fn complete(mut self, output: &ExecOutput) -> Result<AgentResponse, MalformedLineError> {
        if let Some(live) = self.live.as_mut() {
            live.flush(&mut *self.sink);
            debug!(
                agent = %G::KIND,
                chunks = live.chunk_count(),
                bytes = live.byte_count(),
                halted = live.halted().is_some(),
                "live delivery finished"
            );
        }
        let response = parse_output::<G>(output, self.policy)?;
        self.sink.on_complete(&response);
        Ok(response)
    }
}

/// Drives `executor` and returns the authoritative response for grammar `G`.
pub fn run_with_executor<G, E>(
    executor: &mut E,
    policy: ParsePolicy,
    sink: &mut dyn StreamSink,
) -> Result<AgentResponse, ExecutionError<E::Error>>
where
    G: AgentGrammar,
    E: ProcessExecutor,
{
    let mut execution = Execution::<G>::new(policy, sink);
    let output = executor
        .execute(&mut |stream, chunk| execution.on_chunk(stream, chunk))
        .map_err(ExecutionError::Executor)?;
    Ok(execution.complete(&output)?)
}

/// Replays recorded chunks instead of running a process.
#[derive(Debug, Clone, Default)]
pub struct ReplayExecutor {
    chunks: Vec<(OutputStream, Vec<u8>)>,
    captured_stdout: Option<String>,
    exit_code: i32,
}

impl ReplayExecutor {
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    /// Delivers `stdout` as a single chunk.
    pub fn from_stdout(stdout: &str, exit_code: i32) -> Self {
        Self::new(exit_code).chunk(OutputStream::Stdout, stdout)
    }

    pub fn chunk(mut self, stream: OutputStream, bytes: impl AsRef<[u8]>) -> Self {
        self.chunks.push((stream, bytes.as_ref().to_vec()));
        self
    }

    /// Overrides the captured stdout returned after replay, to model a capture that
    /// differs from what was delivered live.
    pub fn captured_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.captured_stdout = Some(stdout.into());
        self
    }
}

impl ProcessExecutor for ReplayExecutor {
    type Error = Infallible;

    fn execute(
        &mut self,
        on_chunk: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> Result<ExecOutput, Self::Error> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        for (stream, bytes) in &self.chunks {
            on_chunk(*stream, bytes);
            match stream {
                OutputStream::Stdout => stdout.extend_from_slice(bytes),
                OutputStream::Stderr => stderr.extend_from_slice(bytes),
            }
        }
        let stdout = match &self.captured_stdout {
            Some(captured) => captured.clone(),
            None => String::from_utf8_lossy(&stdout).into_owned(),
        };
        Ok(ExecOutput {
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: self.exit_code,
        })
    }
}
