use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::ids::{MessageId, SessionId, ToolCallId};
use crate::record::DecodedRecord;

/// The supported agent CLIs.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    ClaudeCode,
    Codex,
    OpenCode,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [Self::ClaudeCode, Self::Codex, Self::OpenCode];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude-code",
            Self::Codex => "codex",
            Self::OpenCode => "opencode",
        }
    }

    /// Name used in diagnostics.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::ClaudeCode => "Claude",
            Self::Codex => "Codex",
            Self::OpenCode => "OpenCode",
        }
    }

    /// Name of the agent's stdout format.
    pub fn output_format(self) -> &'static str {
        match self {
            Self::ClaudeCode => "stream-json",
            Self::Codex | Self::OpenCode => "JSONL",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation as reported by any agent.
///
/// `output == None` means the call never completed; `Some("")` is a completed call with
/// empty output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub tool: String,
    pub input: Map<String, Value>,
    pub output: Option<String>,
    pub call_id: Option<ToolCallId>,
    pub is_error: bool,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            input,
            output: None,
            call_id: None,
            is_error: false,
        }
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output;
        self
    }

    pub fn with_call_id(mut self, call_id: Option<ToolCallId>) -> Self {
        self.call_id = call_id;
        self
    }

    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.output.is_some()
    }
}

/// An error the agent reported inside its output stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamError {
    pub message: String,
    pub code: Option<String>,
    pub details: Map<String, Value>,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: Map::new(),
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

/// Token counters. Agents that do not report a category leave it at zero.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

impl UsageStats {
    pub fn accumulate(&mut self, other: &UsageStats) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.reasoning_tokens = self.reasoning_tokens.saturating_add(other.reasoning_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(other.cache_read_tokens);
        self.cache_write_tokens = self
            .cache_write_tokens
            .saturating_add(other.cache_write_tokens);
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// The normalized result of one agent execution.
///
/// Always produced by the authoritative re-parse of the full captured stdout, never by the
/// live path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    pub(crate) agent_kind: AgentKind,
    pub(crate) text: String,
    pub(crate) exit_code: i32,
    pub(crate) session_id: Option<SessionId>,
    pub(crate) message_id: Option<MessageId>,
    pub(crate) usage: Option<UsageStats>,
    pub(crate) cost: Option<f64>,
    pub(crate) tool_calls: Vec<ToolCall>,
    pub(crate) stream_errors: Vec<StreamError>,
    pub(crate) decoded: Vec<DecodedRecord>,
    pub(crate) parse_failure_count: usize,
    pub(crate) parse_failure_samples: Vec<String>,
}

impl AgentResponse {
    pub fn agent_kind(&self) -> AgentKind {
        self.agent_kind
    }

    /// Concatenated assistant text in stream order.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Last message id seen, for agents that report one (OpenCode).
    pub fn message_id(&self) -> Option<&MessageId> {
        self.message_id.as_ref()
    }

    pub fn usage(&self) -> Option<&UsageStats> {
        self.usage.as_ref()
    }

    /// Dollar cost, when the agent reports one.
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn stream_errors(&self) -> &[StreamError] {
        &self.stream_errors
    }

    /// Every successfully decoded record, in order.
    pub fn decoded(&self) -> &[DecodedRecord] {
        &self.decoded
    }

    pub fn parse_failure_count(&self) -> usize {
        self.parse_failure_count
    }

    pub fn parse_failure_samples(&self) -> &[String] {
        &self.parse_failure_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_output_presence() {
        let pending = ToolCall::new("bash", Map::new());
        assert!(!pending.is_completed());
        assert!(pending.clone().with_output(Some(String::new())).is_completed());
    }

    #[test]
    fn usage_accumulates_per_field() {
        let mut total = UsageStats {
            input_tokens: 10,
            output_tokens: 2,
            ..UsageStats::default()
        };
        total.accumulate(&UsageStats {
            input_tokens: 5,
            output_tokens: 1,
            reasoning_tokens: 1,
            cache_read_tokens: 3,
            cache_write_tokens: 1,
        });
        assert_eq!(total.input_tokens, 15);
        assert_eq!(total.output_tokens, 3);
        assert_eq!(total.reasoning_tokens, 1);
        assert_eq!(total.cache_read_tokens, 3);
        assert_eq!(total.cache_write_tokens, 1);
        assert_eq!(total.total_tokens(), 18);
    }

    #[test]
    fn agent_names() {
        assert_eq!(AgentKind::ClaudeCode.display_name(), "Claude");
        assert_eq!(AgentKind::ClaudeCode.output_format(), "stream-json");
        assert_eq!(AgentKind::OpenCode.output_format(), "JSONL");
        assert_eq!(AgentKind::Codex.to_string(), "codex");
    }
}
