//! Claude Code `--output-format stream-json` grammar.
//!
//! Tool calls are two-phase: a `tool_use` content block parks a request, and the
//! `tool_result` block that references it settles a single [`ToolCall`].

use serde_json::{Map, Value};
use tracing::trace;

use crate::extract::{
    array_at, bool_at, count_at, f64_at, first_string_at, non_empty_string_at, object_at,
    string_at, text_or_json,
};
use crate::fold::{Accumulator, AgentGrammar, EventEnvelope};
use crate::ids::{SessionId, ToolCallId};
use crate::record::DecodedRecord;
use crate::response::{AgentKind, StreamError, ToolCall, UsageStats};
use crate::sink::StreamSink;

/// Tool name given to a result whose request was never seen.
pub const ORPHAN_RESULT_TOOL: &str = "tool_result";

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeCode;

#[derive(Debug, Clone, PartialEq)]
pub enum ClaudeEvent {
    System {
        subtype: String,
    },
    /// `assistant` or `user` message.
    Message {
        role: String,
        content: Vec<ContentBlock>,
    },
    Result(ResultSummary),
    /// `stream_event` partial deltas (`--include-partial-messages`). Informational only;
    /// the complete assistant message restates the text.
    PartialMessage {
        text_delta: Option<String>,
    },
    Error {
        message: String,
        code: Option<String>,
    },
    Unknown {
        event_type: String,
        record: DecodedRecord,
    },
}

/// Final `result` record of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub subtype: String,
    pub is_error: bool,
    pub result: String,
    pub usage: Option<UsageStats>,
    pub total_cost_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: Option<ToolCallId>,
        name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: Option<ToolCallId>,
        content: String,
        is_error: bool,
    },
    Thinking {
        thinking: String,
    },
    Other {
        block_type: String,
    },
}

/// Tool requests waiting for their result, in request order.
#[derive(Debug, Clone, Default)]
pub struct PendingToolUses {
    requests: Vec<PendingToolUse>,
}

#[derive(Debug, Clone)]
struct PendingToolUse {
    id: Option<ToolCallId>,
    name: String,
    input: Map<String, Value>,
}

impl PendingToolUses {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn park(&mut self, request: PendingToolUse) {
        self.requests.push(request);
    }

    fn take(&mut self, id: Option<&ToolCallId>) -> Option<PendingToolUse> {
        let id = id?;
        let index = self
            .requests
            .iter()
            .position(|request| request.id.as_ref() == Some(id))?;
        Some(self.requests.remove(index))
    }
}

impl AgentGrammar for ClaudeCode {
    type Event = ClaudeEvent;
    type State = PendingToolUses;

    const KIND: AgentKind = AgentKind::ClaudeCode;

    fn classify(record: &DecodedRecord) -> EventEnvelope<ClaudeEvent> {
        let data = record.data();
        let event_type = record.get_str("type").map(str::to_string);
        let session_id = record.get_non_empty_str("session_id").and_then(SessionId::new);
        let kind = match event_type.as_deref() {
            Some("system") => ClaudeEvent::System {
                subtype: string_at(data, &["subtype"]),
            },
            Some(role @ ("assistant" | "user")) => ClaudeEvent::Message {
                role: role.to_string(),
                content: array_at(data, &["message", "content"])
                    .iter()
                    .map(content_block)
                    .collect(),
            },
            Some("result") => ClaudeEvent::Result(ResultSummary {
                subtype: string_at(data, &["subtype"]),
                is_error: bool_at(data, &["is_error"]),
                result: string_at(data, &["result"]),
                usage: data.get("usage").and_then(Value::as_object).map(result_usage),
                total_cost_usd: f64_at(data, &["total_cost_usd"]),
            }),
            Some("stream_event") => ClaudeEvent::PartialMessage {
                text_delta: non_empty_string_at(data, &["event", "delta", "text"]),
            },
            Some("error") => {
                let (message, code) = error_payload(data);
                ClaudeEvent::Error { message, code }
            }
            other => {
                let event_type = other.unwrap_or_default().to_string();
                trace!(event_type = %event_type, "unrecognized Claude event");
                ClaudeEvent::Unknown {
                    event_type,
                    record: record.clone(),
                }
            }
        };
        EventEnvelope {
            event_type,
            session_id,
            kind,
        }
    }

    fn fold(
        acc: &mut Accumulator<PendingToolUses>,
        event: EventEnvelope<ClaudeEvent>,
        sink: &mut dyn StreamSink,
    ) {
        acc.restate_session(event.session_id.as_ref());
        match event.kind {
            ClaudeEvent::Message { role, content } => {
                for block in content {
                    fold_block(acc, &role, block, sink);
                }
            }
            ClaudeEvent::Result(summary) => {
                if let Some(usage) = summary.usage {
                    acc.replace_usage(usage);
                }
                acc.replace_cost(summary.total_cost_usd);
                if summary.is_error {
                    let message = if summary.result.is_empty() {
                        summary.subtype.clone()
                    } else {
                        summary.result
                    };
                    let code = (!summary.subtype.is_empty()).then_some(summary.subtype);
                    acc.report_error(StreamError::new(message).with_code(code), sink);
                }
            }
            ClaudeEvent::Error { message, code } => {
                acc.report_error(StreamError::new(message).with_code(code), sink);
            }
            ClaudeEvent::System { .. }
            | ClaudeEvent::PartialMessage { .. }
            | ClaudeEvent::Unknown { .. } => {}
        }
    }

    fn finish(acc: &mut Accumulator<PendingToolUses>) {
        let pending = std::mem::take(acc.state_mut());
        for request in pending.requests {
            acc.push_unsettled(ToolCall::new(request.name, request.input).with_call_id(request.id));
        }
    }
}

fn fold_block(
    acc: &mut Accumulator<PendingToolUses>,
    role: &str,
    block: ContentBlock,
    sink: &mut dyn StreamSink,
) {
    match block {
        ContentBlock::Text { text } if role == "assistant" => acc.append_text(&text, sink),
        ContentBlock::ToolUse { id, name, input } => {
            acc.state_mut().park(PendingToolUse { id, name, input });
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let call = match acc.state_mut().take(tool_use_id.as_ref()) {
                Some(request) => ToolCall::new(request.name, request.input),
                None => {
                    let mut input = Map::new();
                    input.insert(
                        "tool_use_id".to_string(),
                        Value::String(
                            tool_use_id
                                .as_ref()
                                .map(ToolCallId::to_string)
                                .unwrap_or_default(),
                        ),
                    );
                    ToolCall::new(ORPHAN_RESULT_TOOL, input)
                }
            };
            let call = call
                .with_output(Some(content))
                .with_call_id(tool_use_id)
                .with_error(is_error);
            acc.settle_tool_call(call, sink);
        }
        ContentBlock::Text { .. } | ContentBlock::Thinking { .. } | ContentBlock::Other { .. } => {}
    }
}

fn content_block(block: &Value) -> ContentBlock {
    let Some(block) = block.as_object() else {
        return ContentBlock::Other {
            block_type: String::new(),
        };
    };
    match string_at(block, &["type"]).as_str() {
        "text" => ContentBlock::Text {
            text: string_at(block, &["text"]),
        },
        "tool_use" => ContentBlock::ToolUse {
            id: non_empty_string_at(block, &["id"]).and_then(ToolCallId::new),
            name: string_at(block, &["name"]),
            input: object_at(block, &["input"]),
        },
        "tool_result" => ContentBlock::ToolResult {
            tool_use_id: non_empty_string_at(block, &["tool_use_id"]).and_then(ToolCallId::new),
            content: tool_result_content(block.get("content")),
            is_error: bool_at(block, &["is_error"]),
        },
        "thinking" => ContentBlock::Thinking {
            thinking: string_at(block, &["thinking"]),
        },
        other => ContentBlock::Other {
            block_type: other.to_string(),
        },
    }
}

/// String content is kept; a list of `text` blocks is joined with newlines; anything else
/// is serialized.
fn tool_result_content(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                Value::Array(blocks.clone()).to_string()
            } else {
                texts.join("\n")
            }
        }
        Some(other) => text_or_json(other),
    }
}

fn result_usage(usage: &Map<String, Value>) -> UsageStats {
    UsageStats {
        input_tokens: count_at(usage, &["input_tokens"]),
        output_tokens: count_at(usage, &["output_tokens"]),
        reasoning_tokens: 0,
        cache_read_tokens: count_at(usage, &["cache_read_input_tokens"]),
        cache_write_tokens: count_at(usage, &["cache_creation_input_tokens"]),
    }
}

/// `error` is either a plain string or an object with `message` and `type`/`code`.
fn error_payload(data: &Map<String, Value>) -> (String, Option<String>) {
    match data.get("error") {
        Some(Value::String(message)) => (message.clone(), None),
        Some(Value::Object(error)) => (
            first_string_at(error, &[&["message"], &["type"]]).unwrap_or_default(),
            first_string_at(error, &[&["code"], &["type"]]),
        ),
        _ => (string_at(data, &["message"]), None),
    }
}
