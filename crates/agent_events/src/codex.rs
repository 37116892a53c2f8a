//! Codex `exec --json` grammar.
//!
//! Every completed item other than an agent message or an error becomes a single-shot
//! [`ToolCall`]. Usage is reported once per turn and replaces earlier figures.

use serde_json::{Map, Value};
use tracing::trace;

use crate::extract::{
    array_at, count_at, first_string_at, i64_at, non_empty_string_at, object_at, present_at,
    str_at, string_at, text_or_json,
};
use crate::fold::{Accumulator, AgentGrammar, EventEnvelope};
use crate::ids::{SessionId, ToolCallId};
use crate::record::DecodedRecord;
use crate::response::{AgentKind, StreamError, ToolCall, UsageStats};
use crate::sink::StreamSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct Codex;

#[derive(Debug, Clone, PartialEq)]
pub enum CodexEvent {
    /// `thread.started` or `thread.resumed`; the envelope carries the thread id.
    ThreadStarted,
    TurnStarted,
    TurnCompleted {
        usage: Option<UsageStats>,
    },
    TurnFailed {
        message: String,
        code: Option<String>,
    },
    ItemStarted(CodexItem),
    ItemUpdated(CodexItem),
    ItemCompleted(CodexItem),
    Error {
        message: String,
        code: Option<String>,
    },
    Unknown {
        event_type: String,
        record: DecodedRecord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodexItem {
    pub id: Option<ToolCallId>,
    pub status: String,
    pub details: ItemDetails,
}

impl CodexItem {
    /// `error`, `failed`, `cancelled` and `canceled`, in any case.
    pub fn has_failed_status(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "error" | "failed" | "cancelled" | "canceled"
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemDetails {
    AgentMessage {
        text: String,
    },
    Reasoning {
        text: String,
    },
    CommandExecution {
        command: String,
        output: Option<String>,
        exit_code: Option<i64>,
    },
    FileChange {
        path: String,
        action: String,
        diff: Option<String>,
        content: Option<String>,
        changes: Option<Value>,
    },
    McpToolCall {
        server: String,
        tool: String,
        arguments: Map<String, Value>,
        result: Option<Value>,
        error: Option<Value>,
    },
    WebSearch {
        query: String,
        results: Option<Value>,
    },
    PlanUpdate {
        plan: String,
    },
    TodoList {
        items: Vec<Value>,
    },
    Error {
        message: String,
    },
    Unknown {
        item_type: String,
        raw: Map<String, Value>,
    },
}

impl AgentGrammar for Codex {
    type Event = CodexEvent;
    type State = ();

    const KIND: AgentKind = AgentKind::Codex;

    fn classify(record: &DecodedRecord) -> EventEnvelope<CodexEvent> {
        let data = record.data();
        let event_type = record.get_str("type").map(str::to_string);
        let session_id = record.get_non_empty_str("thread_id").and_then(SessionId::new);
        let kind = match event_type.as_deref() {
            Some("thread.started" | "thread.resumed") => CodexEvent::ThreadStarted,
            Some("turn.started") => CodexEvent::TurnStarted,
            Some("turn.completed") => CodexEvent::TurnCompleted {
                usage: data.get("usage").and_then(Value::as_object).map(turn_usage),
            },
            Some("turn.failed") => {
                let (message, code) = error_fields(data);
                CodexEvent::TurnFailed { message, code }
            }
            Some("item.started") => CodexEvent::ItemStarted(item(data)),
            Some("item.updated" | "item.delta") => CodexEvent::ItemUpdated(item(data)),
            Some("item.completed") => CodexEvent::ItemCompleted(item(data)),
            Some("error") => {
                let (message, code) = error_fields(data);
                CodexEvent::Error { message, code }
            }
            other => {
                let event_type = other.unwrap_or_default().to_string();
                trace!(event_type = %event_type, "unrecognized Codex event");
                CodexEvent::Unknown {
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

    fn fold(acc: &mut Accumulator<()>, event: EventEnvelope<CodexEvent>, sink: &mut dyn StreamSink) {
        match event.kind {
            CodexEvent::ThreadStarted => acc.restate_session(event.session_id.as_ref()),
            CodexEvent::TurnCompleted { usage: Some(usage) } => acc.replace_usage(usage),
            CodexEvent::TurnFailed { message, code } | CodexEvent::Error { message, code } => {
                acc.report_error(StreamError::new(message).with_code(code), sink);
            }
            CodexEvent::ItemCompleted(item) => fold_completed_item(acc, item, sink),
            CodexEvent::TurnStarted
            | CodexEvent::TurnCompleted { usage: None }
            | CodexEvent::ItemStarted(_)
            | CodexEvent::ItemUpdated(_)
            | CodexEvent::Unknown { .. } => {}
        }
    }
}

fn fold_completed_item(acc: &mut Accumulator<()>, item: CodexItem, sink: &mut dyn StreamSink) {
    if let ItemDetails::AgentMessage { text } = &item.details {
        acc.append_text(text, sink);
        return;
    }
    if let ItemDetails::Error { message } = &item.details {
        let mut details = Map::new();
        if let Some(id) = &item.id {
            details.insert("item_id".to_string(), Value::String(id.to_string()));
        }
        acc.report_error(StreamError::new(message.clone()).with_details(details), sink);
        return;
    }
    if let Some(call) = tool_call(item) {
        acc.settle_tool_call(call, sink);
    }
}

/// Maps a completed item to the tool call it represents, if any.
pub fn tool_call(item: CodexItem) -> Option<ToolCall> {
    let failed = item.has_failed_status();
    let call = match item.details {
        ItemDetails::AgentMessage { .. } | ItemDetails::Error { .. } => return None,
        ItemDetails::CommandExecution {
            command,
            output,
            exit_code,
        } => ToolCall::new("bash", input_of([("command", Value::String(command))]))
            .with_output(output)
            .with_error(failed || exit_code.is_some_and(|code| code != 0)),
        ItemDetails::McpToolCall {
            tool,
            arguments,
            result,
            error,
            ..
        } => ToolCall::new(tool, arguments)
            .with_output(result.map(|value| value.to_string()))
            .with_error(failed || error.is_some()),
        ItemDetails::FileChange {
            path,
            action,
            diff,
            content,
            changes,
        } => {
            let mut input = input_of([
                ("path", Value::String(path)),
                ("action", Value::String(action)),
            ]);
            if let Some(changes) = changes {
                input.insert("changes".to_string(), changes);
            }
            ToolCall::new("file_change", input)
                .with_output(diff.or(content))
                .with_error(failed)
        }
        ItemDetails::WebSearch { query, results } => {
            ToolCall::new("web_search", input_of([("query", Value::String(query))]))
                .with_output(results.map(|value| value.to_string()))
                .with_error(failed)
        }
        ItemDetails::PlanUpdate { plan } => ToolCall::new("plan_update", Map::new())
            .with_output(Some(plan))
            .with_error(failed),
        ItemDetails::Reasoning { text } => ToolCall::new("reasoning", Map::new())
            .with_output(Some(text))
            .with_error(failed),
        ItemDetails::TodoList { items } => ToolCall::new("todo_list", Map::new())
            .with_output(Some(Value::Array(items).to_string()))
            .with_error(failed),
        ItemDetails::Unknown { item_type, raw } => ToolCall::new(item_type, Map::new())
            .with_output(Some(Value::Object(raw).to_string()))
            .with_error(failed),
    };
    Some(call.with_call_id(item.id))
}

fn input_of<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn item(data: &Map<String, Value>) -> CodexItem {
    let raw = object_at(data, &["item"]);
    let id = first_string_at(&raw, &[&["id"], &["item_id"]]).and_then(ToolCallId::new);
    let status = string_at(&raw, &["status"]);
    let item_type = first_string_at(&raw, &[&["type"], &["item_type"]]).unwrap_or_default();
    let details = match item_type.as_str() {
        "agent_message" => ItemDetails::AgentMessage {
            text: string_at(&raw, &["text"]),
        },
        "reasoning" => ItemDetails::Reasoning {
            text: string_at(&raw, &["text"]),
        },
        "command_execution" => ItemDetails::CommandExecution {
            command: string_at(&raw, &["command"]),
            output: str_at(&raw, &["aggregated_output"])
                .or_else(|| str_at(&raw, &["output"]))
                .map(str::to_string),
            exit_code: i64_at(&raw, &["exit_code"]),
        },
        "file_change" => ItemDetails::FileChange {
            path: string_at(&raw, &["path"]),
            action: first_string_at(&raw, &[&["action"], &["kind"]]).unwrap_or_default(),
            diff: str_at(&raw, &["diff"]).map(str::to_string),
            content: str_at(&raw, &["content"]).map(str::to_string),
            changes: present_at(&raw, &["changes"]).cloned(),
        },
        "mcp_tool_call" => ItemDetails::McpToolCall {
            server: string_at(&raw, &["server"]),
            tool: string_at(&raw, &["tool"]),
            arguments: object_at(&raw, &["arguments"]),
            result: present_at(&raw, &["result"]).cloned(),
            error: present_at(&raw, &["error"]).cloned(),
        },
        "web_search" => ItemDetails::WebSearch {
            query: string_at(&raw, &["query"]),
            results: present_at(&raw, &["results"]).cloned(),
        },
        "plan_update" => ItemDetails::PlanUpdate {
            plan: present_at(&raw, &["plan"]).map(text_or_json).unwrap_or_default(),
        },
        "todo_list" => ItemDetails::TodoList {
            items: array_at(&raw, &["items"]),
        },
        "error" => ItemDetails::Error {
            message: string_at(&raw, &["message"]),
        },
        _ => ItemDetails::Unknown {
            item_type: item_type.clone(),
            raw,
        },
    };
    CodexItem {
        id,
        status,
        details,
    }
}

fn turn_usage(usage: &Map<String, Value>) -> UsageStats {
    UsageStats {
        input_tokens: count_at(usage, &["input_tokens"]),
        output_tokens: count_at(usage, &["output_tokens"]),
        reasoning_tokens: count_at(usage, &["reasoning_output_tokens"]),
        cache_read_tokens: count_at(usage, &["cached_input_tokens"]),
        cache_write_tokens: 0,
    }
}

/// Top-level `message`/`code`, or the same fields nested under `error`.
fn error_fields(data: &Map<String, Value>) -> (String, Option<String>) {
    let message = first_string_at(data, &[&["message"], &["error", "message"]])
        .or_else(|| non_empty_string_at(data, &["error"]))
        .unwrap_or_default();
    let code = first_string_at(data, &[&["code"], &["error", "code"], &["error", "type"]]);
    (message, code)
}
