#![forbid(unsafe_code)]
//! Runs agent CLIs as child processes and feeds their output through `agent_events`.
//!
//! [`execute_streaming`] spawns a binary, forwards stdout/stderr chunks to a callback as
//! they are read and returns the full capture. [`run_agent`] wires that into an
//! [`agent_events::Execution`] so a [`agent_events::StreamSink`] gets live notifications
//! followed by the authoritative [`agent_events::AgentResponse`].
//!
//! Argument construction for each agent is left to the caller; [`AgentCommand`] only
//! carries what to run.

mod command;
mod error;
mod process;

pub use command::{AgentCommand, DEFAULT_TIMEOUT};
pub use error::{ExecError, RunError};
pub use process::{execute_streaming, run_agent, run_agent_kind, BlockingExecutor};
