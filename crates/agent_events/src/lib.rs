#![forbid(unsafe_code)]
//! Normalization core for agent CLI JSONL/NDJSON output.
//!
//! Three agent grammars (Claude Code `stream-json`, Codex `exec --json`, OpenCode
//! `run --format json`) are folded into one [`AgentResponse`] / [`ToolCall`] model.
//! This crate provides:
//! - A chunk-to-line reassembler ([`LineBuffer`]) and a record decoder with a
//!   fail-fast / lenient [`ParsePolicy`].
//! - One closed event enum per agent plus the [`AgentGrammar`] fold rules.
//! - A best-effort live path ([`LiveFolder`]) that notifies a [`StreamSink`] while the
//!   process runs, and the authoritative re-parse ([`parse_output`]) whose result is the
//!   only thing returned to callers.
//!
//! It performs no I/O. Process execution is consumed through [`ProcessExecutor`]
//! (see the `agent_exec` crate for a tokio implementation).

mod config;
mod decode;
mod error;
mod execution;
mod extract;
mod fold;
mod ids;
mod line_buffer;
mod live;
mod parse;
mod record;
mod response;
mod sink;

pub mod claude_code;
pub mod codex;
pub mod opencode;

pub use config::{ParsePolicy, MAX_PARSE_FAILURE_SAMPLES, PARSE_FAILURE_SAMPLE_CHARS};
pub use decode::{DecodeContext, Decoded, ParseFailures, RecordDecoder};
pub use error::{ExecutionError, MalformedLineError};
pub use execution::{
    run_with_executor, ExecOutput, Execution, OutputStream, ProcessExecutor, ReplayExecutor,
};
pub use fold::{Accumulator, AgentGrammar, EventEnvelope};
pub use ids::{MessageId, SessionId, ToolCallId};
pub use line_buffer::{split_lines, LineBuffer, SplitLines};
pub use live::LiveFolder;
pub use parse::{parse_agent_output, parse_output, parse_stdout};
pub use record::DecodedRecord;
pub use response::{AgentKind, AgentResponse, StreamError, ToolCall, UsageStats};
pub use sink::{CallbackSink, NullSink, StreamSink};
