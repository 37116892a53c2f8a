use tracing::warn;

use crate::config::ParsePolicy;
use crate::decode::DecodeContext;
use crate::error::MalformedLineError;
use crate::execution::OutputStream;
use crate::fold::AgentGrammar;
use crate::ids::SessionId;
use crate::line_buffer::LineBuffer;
use crate::parse::Pipeline;
use crate::response::ToolCall;
use crate::sink::StreamSink;

/// Incremental fold over stdout chunks as they arrive.
///
/// Only drives sink notifications; its state is never returned as a response. After a
/// malformed line under a fail-fast policy it stops delivering and ignores later chunks.
pub struct LiveFolder<G: AgentGrammar> {
    buffer: LineBuffer,
    pipeline: Pipeline<G>,
    halted: Option<MalformedLineError>,
    chunks: usize,
    bytes: usize,
}

impl<G: AgentGrammar> LiveFolder<G> {
    pub fn new(policy: ParsePolicy) -> Self {
        Self {
            buffer: LineBuffer::new(),
            pipeline: Pipeline::new(policy, false),
            halted: None,
            chunks: 0,
            bytes: 0,
        }
    }

    /// Stderr chunks are ignored; only stdout carries events.
    pub fn consume(&mut self, stream: OutputStream, chunk: &[u8], sink: &mut dyn StreamSink) {
        if stream != OutputStream::Stdout || self.halted.is_some() {
            return;
        }
        self.chunks += 1;
        self.bytes += chunk.len();
        let lines = self.buffer.consume_bytes(chunk);
        self.ingest_lines(lines, sink);
    }

    /// Processes the unterminated tail once the process has exited.
    pub fn flush(&mut self, sink: &mut dyn StreamSink) {
        if self.halted.is_some() {
            return;
        }
        if let Some(line) = self.buffer.flush() {
            self.ingest_lines(vec![line], sink);
        }
    }

    pub fn halted(&self) -> Option<&MalformedLineError> {
        self.halted.as_ref()
    }

    pub fn text(&self) -> &str {
        self.pipeline.accumulator().text()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.pipeline.accumulator().tool_calls()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.pipeline.accumulator().session_id()
    }

    pub fn parse_failure_count(&self) -> usize {
        self.pipeline.decoder().failures().count()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn byte_count(&self) -> usize {
        self.bytes
    }

    fn ingest_lines(&mut self, lines: Vec<String>, sink: &mut dyn StreamSink) {
        let context = DecodeContext::Stream { agent: G::KIND };
        for line in lines {
            if let Err(err) = self.pipeline.ingest(&line, &context, &mut *sink) {
                warn!(agent = %G::KIND, error = %err, "halting live event delivery");
                self.halted = Some(err);
                return;
            }
        }
    }
}

impl<G: AgentGrammar> std::fmt::Debug for LiveFolder<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFolder")
            .field("agent", &G::KIND)
            .field("pending", &self.buffer.tail())
            .field("halted", &self.halted)
            .field("chunks", &self.chunks)
            .field("bytes", &self.bytes)
            .finish()
    }
}
