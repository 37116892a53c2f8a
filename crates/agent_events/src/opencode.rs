//! OpenCode `run --format json` grammar.
//!
//! Tool calls arrive complete in one `tool_use` event. Usage and cost are reported per
//! step and summed across `step_finish` events.

use serde_json::{Map, Value};
use tracing::trace;

use crate::extract::{
    count_at, f64_at, first_string_at, i64_at, lookup, non_empty_string_at, object_at,
    present_at, string_at, text_or_json,
};
use crate::fold::{Accumulator, AgentGrammar, EventEnvelope};
use crate::ids::{MessageId, SessionId, ToolCallId};
use crate::record::DecodedRecord;
use crate::response::{AgentKind, StreamError, ToolCall, UsageStats};
use crate::sink::StreamSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCode;

/// Identifiers shared by every `part`-carrying event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartRef {
    pub message_id: Option<MessageId>,
    pub part_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenCodeEvent {
    StepStart {
        part: PartRef,
        snapshot: String,
    },
    Text {
        part: PartRef,
        text: String,
        start_time: Option<i64>,
        end_time: Option<i64>,
    },
    ToolUse(ToolUse),
    StepFinish {
        part: PartRef,
        reason: String,
        snapshot: String,
        cost: f64,
        tokens: Option<UsageStats>,
    },
    Error {
        message: String,
        code: Option<String>,
        details: Map<String, Value>,
    },
    Unknown {
        event_type: String,
        record: DecodedRecord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub part: PartRef,
    pub call_id: Option<ToolCallId>,
    pub tool: String,
    pub status: String,
    pub input: Map<String, Value>,
    pub output: Option<String>,
    pub title: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

impl ToolUse {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(self.tool.clone(), self.input.clone())
            .with_output(self.output.clone())
            .with_call_id(self.call_id.clone())
            .with_error(!self.is_completed())
    }
}

impl AgentGrammar for OpenCode {
    type Event = OpenCodeEvent;
    type State = ();

    const KIND: AgentKind = AgentKind::OpenCode;

    fn classify(record: &DecodedRecord) -> EventEnvelope<OpenCodeEvent> {
        let data = record.data();
        let event_type = record.get_str("type").map(str::to_string);
        let session_id = record.get_non_empty_str("sessionID").and_then(SessionId::new);
        let kind = match event_type.as_deref() {
            Some("step_start") => OpenCodeEvent::StepStart {
                part: part_ref(data),
                snapshot: string_at(data, &["part", "snapshot"]),
            },
            Some("text") => OpenCodeEvent::Text {
                part: part_ref(data),
                text: string_at(data, &["part", "text"]),
                start_time: i64_at(data, &["part", "time", "start"]),
                end_time: i64_at(data, &["part", "time", "end"]),
            },
            Some("tool_use") => OpenCodeEvent::ToolUse(ToolUse {
                part: part_ref(data),
                call_id: non_empty_string_at(data, &["part", "callID"]).and_then(ToolCallId::new),
                tool: string_at(data, &["part", "tool"]),
                status: non_empty_string_at(data, &["part", "state", "status"])
                    .unwrap_or_else(|| "unknown".to_string()),
                input: object_at(data, &["part", "state", "input"]),
                output: present_at(data, &["part", "state", "output"]).map(text_or_json),
                title: non_empty_string_at(data, &["part", "state", "title"]),
                start_time: i64_at(data, &["part", "state", "time", "start"]),
                end_time: i64_at(data, &["part", "state", "time", "end"]),
            }),
            Some("step_finish") => OpenCodeEvent::StepFinish {
                part: part_ref(data),
                reason: non_empty_string_at(data, &["part", "reason"])
                    .unwrap_or_else(|| "unknown".to_string()),
                snapshot: string_at(data, &["part", "snapshot"]),
                cost: f64_at(data, &["part", "cost"]).unwrap_or(0.0),
                tokens: lookup(data, &["part", "tokens"])
                    .and_then(Value::as_object)
                    .map(step_tokens),
            },
            Some("error") => {
                let (message, code) = error_fields(data);
                OpenCodeEvent::Error {
                    message,
                    code,
                    details: data.clone(),
                }
            }
            other => {
                let event_type = other.unwrap_or_default().to_string();
                trace!(event_type = %event_type, "unrecognized OpenCode event");
                OpenCodeEvent::Unknown {
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
        acc: &mut Accumulator<()>,
        event: EventEnvelope<OpenCodeEvent>,
        sink: &mut dyn StreamSink,
    ) {
        acc.assign_session_once(event.session_id.as_ref());
        match event.kind {
            OpenCodeEvent::StepStart { part, .. } => acc.restate_message(part.message_id.as_ref()),
            OpenCodeEvent::Text { part, text, .. } => {
                acc.restate_message(part.message_id.as_ref());
                acc.append_text(&text, sink);
            }
            OpenCodeEvent::ToolUse(tool_use) => {
                acc.restate_message(tool_use.part.message_id.as_ref());
                acc.settle_tool_call(tool_use.to_tool_call(), sink);
            }
            OpenCodeEvent::StepFinish {
                part, cost, tokens, ..
            } => {
                acc.restate_message(part.message_id.as_ref());
                if let Some(tokens) = tokens {
                    acc.sum_usage(&tokens);
                }
                acc.add_cost(cost);
            }
            OpenCodeEvent::Error {
                message,
                code,
                details,
            } => {
                let error = StreamError::new(message)
                    .with_code(code)
                    .with_details(details);
                acc.report_error(error, sink);
            }
            OpenCodeEvent::Unknown { .. } => {}
        }
    }
}

fn part_ref(data: &Map<String, Value>) -> PartRef {
    PartRef {
        message_id: non_empty_string_at(data, &["part", "messageID"]).and_then(MessageId::new),
        part_id: non_empty_string_at(data, &["part", "id"]),
    }
}

fn step_tokens(tokens: &Map<String, Value>) -> UsageStats {
    UsageStats {
        input_tokens: count_at(tokens, &["input"]),
        output_tokens: count_at(tokens, &["output"]),
        reasoning_tokens: count_at(tokens, &["reasoning"]),
        cache_read_tokens: count_at(tokens, &["cache", "read"]),
        cache_write_tokens: count_at(tokens, &["cache", "write"]),
    }
}

/// Errors nest their payload in `part.error`, `error` or `error.data`; the first one
/// carrying a message wins. A bare string `error` is the message itself.
fn error_fields(data: &Map<String, Value>) -> (String, Option<String>) {
    let candidates: [&[&str]; 3] = [&["part", "error"], &["error"], &["error", "data"]];
    for path in candidates {
        let Some(payload) = lookup(data, path).and_then(Value::as_object) else {
            continue;
        };
        if let Some(message) = non_empty_string_at(payload, &["message"]) {
            let code = first_string_at(payload, &[&["code"], &["name"]])
                .or_else(|| first_string_at(data, &[&["error", "code"], &["error", "name"]]));
            return (message, code);
        }
    }
    let message = first_string_at(data, &[&["error"], &["message"]]).unwrap_or_default();
    (message, first_string_at(data, &[&["code"]]))
}
