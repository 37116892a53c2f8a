use std::fmt;

use crate::ids::{MessageId, SessionId};
use crate::record::DecodedRecord;
use crate::response::{AgentKind, StreamError, ToolCall, UsageStats};
use crate::sink::StreamSink;

/// A classified record: common header plus the agent-specific variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope<K> {
    /// Raw discriminator (`type`), if the record had one.
    pub event_type: Option<String>,
    /// Non-empty session/thread id carried by the record.
    pub session_id: Option<SessionId>,
    pub kind: K,
}

/// One agent's output grammar: how records classify into events and how events fold
/// into a response.
///
/// Both the live path and the authoritative re-parse run the same `classify` and `fold`,
/// so the two can only differ in which lines they saw.
pub trait AgentGrammar {
    type Event: fmt::Debug + Clone;
    /// Grammar-private fold state (e.g. pending tool requests).
    type State: Default;

    const KIND: AgentKind;

    /// Total: unrecognized discriminators map to the grammar's `Unknown` variant.
    fn classify(record: &DecodedRecord) -> EventEnvelope<Self::Event>;

    fn fold(
        acc: &mut Accumulator<Self::State>,
        event: EventEnvelope<Self::Event>,
        sink: &mut dyn StreamSink,
    );

    /// Runs once after the last record of an authoritative parse.
    fn finish(_acc: &mut Accumulator<Self::State>) {}
}

/// Response state under construction.
///
/// Every mutation that callers can observe live goes through a method that also notifies
/// the sink, so live notifications and accumulated state stay in step.
#[derive(Debug, Default)]
pub struct Accumulator<S> {
    text: String,
    tool_calls: Vec<ToolCall>,
    stream_errors: Vec<StreamError>,
    session_id: Option<SessionId>,
    message_id: Option<MessageId>,
    usage: Option<UsageStats>,
    cost: Option<f64>,
    state: S,
}

impl<S> Accumulator<S> {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn stream_errors(&self) -> &[StreamError] {
        &self.stream_errors
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        self.message_id.as_ref()
    }

    pub fn usage(&self) -> Option<&UsageStats> {
        self.usage.as_ref()
    }

    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn append_text(&mut self, fragment: &str, sink: &mut dyn StreamSink) {
        if fragment.is_empty() {
            return;
        }
        self.text.push_str(fragment);
        sink.on_text(fragment);
    }

    /// Records a tool call whose outcome is known and notifies the sink.
    pub fn settle_tool_call(&mut self, call: ToolCall, sink: &mut dyn StreamSink) {
        sink.on_tool_use(&call);
        self.tool_calls.push(call);
    }

    /// Records a call that never settled. The sink is not told about it.
    pub fn push_unsettled(&mut self, call: ToolCall) {
        self.tool_calls.push(call);
    }

    pub fn report_error(&mut self, error: StreamError, sink: &mut dyn StreamSink) {
        sink.on_error(&error);
        self.stream_errors.push(error);
    }

    /// First non-empty id wins.
    pub fn assign_session_once(&mut self, session_id: Option<&SessionId>) {
        if self.session_id.is_none() {
            self.session_id = session_id.cloned();
        }
    }

    /// Last non-empty id wins.
    pub fn restate_session(&mut self, session_id: Option<&SessionId>) {
        if let Some(id) = session_id {
            self.session_id = Some(id.clone());
        }
    }

    /// Last non-empty message id wins.
    pub fn restate_message(&mut self, message_id: Option<&MessageId>) {
        if let Some(id) = message_id {
            self.message_id = Some(id.clone());
        }
    }

    pub fn sum_usage(&mut self, usage: &UsageStats) {
        match self.usage.as_mut() {
            Some(total) => total.accumulate(usage),
            None => self.usage = Some(*usage),
        }
    }

    pub fn replace_usage(&mut self, usage: UsageStats) {
        self.usage = Some(usage);
    }

    /// Adds a per-step cost. Zero and negative deltas leave the cost untouched.
    pub fn add_cost(&mut self, delta: f64) {
        if delta > 0.0 {
            self.cost = Some(self.cost.unwrap_or(0.0) + delta);
        }
    }

    pub fn replace_cost(&mut self, cost: Option<f64>) {
        if cost.is_some() {
            self.cost = cost;
        }
    }

    pub(crate) fn into_parts(self) -> AccumulatedParts {
        AccumulatedParts {
            text: self.text,
            tool_calls: self.tool_calls,
            stream_errors: self.stream_errors,
            session_id: self.session_id,
            message_id: self.message_id,
            usage: self.usage,
            cost: self.cost,
        }
    }
}

pub(crate) struct AccumulatedParts {
    pub(crate) text: String,
    pub(crate) tool_calls: Vec<ToolCall>,
    pub(crate) stream_errors: Vec<StreamError>,
    pub(crate) session_id: Option<SessionId>,
    pub(crate) message_id: Option<MessageId>,
    pub(crate) usage: Option<UsageStats>,
    pub(crate) cost: Option<f64>,
}
