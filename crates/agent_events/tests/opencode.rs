mod support;

use agent_events::opencode::OpenCode;
use agent_events::{parse_stdout, run_with_executor, ParsePolicy, UsageStats};
use serde_json::json;
use support::{chunked, fixture, Recorder};

#[test]
fn steps_sum_usage_and_cost() {
    let stdout = fixture("opencode", "aggregate.jsonl");
    let response = parse_stdout::<OpenCode>(&stdout, 0, ParsePolicy::default()).unwrap();

    assert_eq!(response.decoded().len(), 6);
    assert_eq!(response.session_id().map(|id| id.as_str()), Some("sess_1"));
    assert_eq!(response.message_id().map(|id| id.as_str()), Some("msg_2"));
    assert_eq!(response.text(), "Hello OpenCode");
    assert_eq!(
        response.usage(),
        Some(&UsageStats {
            input_tokens: 15,
            output_tokens: 3,
            reasoning_tokens: 1,
            cache_read_tokens: 3,
            cache_write_tokens: 1,
        })
    );
    let cost = response.cost().unwrap();
    assert!((cost - 0.3).abs() < 1e-9, "cost {cost}");
}

#[test]
fn tool_and_error_events_reach_sink_and_response() {
    let stdout = fixture("opencode", "tool_and_error.jsonl");
    let mut recorder = Recorder::default();
    let mut executor = chunked(&stdout, 13, 0);

    let response =
        run_with_executor::<OpenCode, _>(&mut executor, ParsePolicy::default(), &mut recorder)
            .unwrap();

    assert_eq!(response.text(), "Hello OpenCode");
    assert_eq!(
        response.session_id().map(|id| id.as_str()),
        Some("sess_stream")
    );
    assert_eq!(response.cost(), Some(0.42));
    assert_eq!(response.usage().map(|usage| usage.input_tokens), Some(11));

    assert_eq!(response.tool_calls().len(), 1);
    let call = &response.tool_calls()[0];
    assert_eq!(call.tool, "bash");
    assert_eq!(call.call_id.as_ref().map(|id| id.as_str()), Some("call_1"));
    assert_eq!(call.input.get("command"), Some(&json!("pwd")));
    assert_eq!(call.output.as_deref(), Some(r#"{"cwd":"/tmp"}"#));
    assert!(!call.is_error);

    assert_eq!(recorder.text(), "Hello OpenCode");
    assert_eq!(recorder.tools, response.tool_calls());
    assert_eq!(recorder.errors.len(), 1);
    assert_eq!(recorder.errors[0].message, "Temporary upstream issue");
    assert_eq!(recorder.errors[0].code.as_deref(), Some("UPSTREAM_TEMP"));
    assert_eq!(recorder.errors[0].details.get("sessionID"), Some(&json!("sess_stream")));
}

#[test]
fn first_session_id_wins() {
    let stdout = [
        r#"{"type":"step_start","sessionID":"","part":{}}"#,
        r#"{"type":"step_start","sessionID":"s1","part":{}}"#,
        r#"{"type":"step_start","sessionID":"s2","part":{}}"#,
    ]
    .join("\n");
    let response = parse_stdout::<OpenCode>(&stdout, 0, ParsePolicy::default()).unwrap();
    assert_eq!(response.session_id().map(|id| id.as_str()), Some("s1"));
}

#[test]
fn free_steps_leave_cost_unset() {
    let stdout = r#"{"type":"step_finish","sessionID":"s","part":{"reason":"stop","cost":0,"tokens":{"input":1,"output":1}}}"#;
    let response = parse_stdout::<OpenCode>(stdout, 0, ParsePolicy::default()).unwrap();
    assert_eq!(response.cost(), None);
    assert_eq!(response.usage().map(|usage| usage.total_tokens()), Some(2));
}

#[test]
fn non_completed_tool_is_an_error() {
    let stdout = r#"{"type":"tool_use","sessionID":"s","part":{"callID":"c","tool":"edit","state":{"status":"error","input":{"file":"a"},"output":"permission denied"}}}"#;
    let response = parse_stdout::<OpenCode>(stdout, 0, ParsePolicy::default()).unwrap();
    let call = &response.tool_calls()[0];
    assert!(call.is_error);
    assert_eq!(call.output.as_deref(), Some("permission denied"));
}

#[test]
fn malformed_lines_under_both_policies() {
    let stdout = [
        r#"{"type":"text","timestamp":2,"sessionID":"sess_1","part":{"messageID":"msg_1","id":"part_2","text":"Hello ","time":{"start":2,"end":3}}}"#,
        "not-json",
        r#"{"type":"text","timestamp":3,"sessionID":"sess_1","part":{"messageID":"msg_1","id":"part_3","text":"OpenCode","time":{"start":3,"end":4}}}"#,
    ]
    .join("\n");

    let err = parse_stdout::<OpenCode>(&stdout, 0, ParsePolicy::default()).unwrap_err();
    assert!(err.context.ends_with("line 2"));

    let response = parse_stdout::<OpenCode>(&stdout, 0, ParsePolicy::lenient()).unwrap();
    assert_eq!(response.decoded().len(), 2);
    assert_eq!(response.text(), "Hello OpenCode");
    assert_eq!(response.parse_failure_count(), 1);
    assert_eq!(response.parse_failure_samples(), ["not-json"]);
}
