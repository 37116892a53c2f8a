mod support;

use std::io;

use agent_events::claude_code::ClaudeCode;
use agent_events::codex::Codex;
use agent_events::opencode::OpenCode;
use agent_events::{
    parse_stdout, run_with_executor, CallbackSink, ExecOutput, Execution, ExecutionError,
    NullSink, OutputStream, ParsePolicy, ProcessExecutor, ReplayExecutor,
};
use support::{fixture, Recorder};

const HELLO: &str = r#"{"type":"text","sessionID":"s1","part":{"messageID":"m1","text":"Hello "}}"#;
const WORLD: &str = r#"{"type":"text","sessionID":"s1","part":{"messageID":"m1","text":"world"}}"#;

#[test]
fn dropped_live_chunk_does_not_lose_data() {
    let full = format!("{HELLO}\n{WORLD}\n");
    let mut executor = ReplayExecutor::new(0)
        .chunk(OutputStream::Stdout, format!("{HELLO}\n"))
        .captured_stdout(full);
    let mut recorder = Recorder::default();

    let response =
        run_with_executor::<OpenCode, _>(&mut executor, ParsePolicy::default(), &mut recorder)
            .unwrap();

    assert_eq!(recorder.text(), "Hello ");
    assert_eq!(response.text(), "Hello world");
}

#[test]
fn duplicated_live_chunk_does_not_duplicate_data() {
    let line = format!("{HELLO}\n");
    let mut executor = ReplayExecutor::new(0)
        .chunk(OutputStream::Stdout, &line)
        .chunk(OutputStream::Stdout, &line)
        .captured_stdout(line.clone());
    let mut recorder = Recorder::default();

    let response =
        run_with_executor::<OpenCode, _>(&mut executor, ParsePolicy::default(), &mut recorder)
            .unwrap();

    assert_eq!(recorder.texts, ["Hello ", "Hello "]);
    assert_eq!(response.text(), "Hello ");
    assert_eq!(recorder.completed.len(), 1);
}

#[test]
fn chunk_boundaries_do_not_change_live_notifications() {
    let stdout = fixture("claude_code", "tool_roundtrip.jsonl");
    let mut baseline = Recorder::default();
    run_with_executor::<ClaudeCode, _>(
        &mut ReplayExecutor::from_stdout(&stdout, 0),
        ParsePolicy::default(),
        &mut baseline,
    )
    .unwrap();

    for size in [1, 2, 3, 5, 17, 100, 4096] {
        let mut recorder = Recorder::default();
        run_with_executor::<ClaudeCode, _>(
            &mut support::chunked(&stdout, size, 0),
            ParsePolicy::default(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(recorder.text(), baseline.text(), "chunk size {size}");
        assert_eq!(recorder.tools, baseline.tools, "chunk size {size}");
        assert_eq!(recorder.errors, baseline.errors, "chunk size {size}");
    }
}

#[test]
fn stderr_is_never_parsed() {
    let mut executor = ReplayExecutor::new(0)
        .chunk(OutputStream::Stderr, format!("{HELLO}\nwarning: not json\n"))
        .chunk(OutputStream::Stdout, format!("{WORLD}\n"));
    let mut recorder = Recorder::default();

    let response =
        run_with_executor::<OpenCode, _>(&mut executor, ParsePolicy::default(), &mut recorder)
            .unwrap();

    assert_eq!(recorder.text(), "world");
    assert_eq!(response.text(), "world");
    assert_eq!(response.parse_failure_count(), 0);
}

#[test]
fn unterminated_tail_is_flushed_live() {
    let mut executor = ReplayExecutor::new(0).chunk(OutputStream::Stdout, HELLO);
    let mut recorder = Recorder::default();
    run_with_executor::<OpenCode, _>(&mut executor, ParsePolicy::default(), &mut recorder)
        .unwrap();
    assert_eq!(recorder.text(), "Hello ");
}

#[test]
fn completion_only_sink_skips_live_path() {
    let mut texts = 0;
    let mut completions = Vec::new();
    {
        let mut sink = CallbackSink::new().with_complete(|response| {
            completions.push(response.text().to_string());
        });
        let mut execution = Execution::<OpenCode>::new(ParsePolicy::default(), &mut sink);
        assert!(execution.live().is_none());
        execution.on_chunk(OutputStream::Stdout, format!("{HELLO}\n").as_bytes());
        let output = ExecOutput {
            stdout: format!("{HELLO}\n"),
            ..ExecOutput::default()
        };
        execution.complete(&output).unwrap();
    }
    {
        let mut sink = CallbackSink::new().with_text(|_| texts += 1);
        run_with_executor::<OpenCode, _>(
            &mut ReplayExecutor::from_stdout(HELLO, 0),
            ParsePolicy::default(),
            &mut sink,
        )
        .unwrap();
    }
    assert_eq!(completions, ["Hello "]);
    assert_eq!(texts, 1);
}

#[test]
fn unknown_events_only_add_decoded_records() {
    let plain = format!("{HELLO}\n{WORLD}");
    let noisy = format!("{HELLO}\n{{\"type\":\"future.event\",\"sessionID\":\"other\"}}\n{WORLD}");
    let plain = parse_stdout::<OpenCode>(&plain, 0, ParsePolicy::default()).unwrap();
    let noisy = parse_stdout::<OpenCode>(&noisy, 0, ParsePolicy::default()).unwrap();

    assert_eq!(noisy.decoded().len(), plain.decoded().len() + 1);
    assert_eq!(noisy.text(), plain.text());
    assert_eq!(noisy.tool_calls(), plain.tool_calls());
    assert_eq!(noisy.session_id(), plain.session_id());
    assert_eq!(noisy.usage(), plain.usage());
}

#[test]
fn live_halt_leaves_final_error_to_authoritative_parse() {
    let stdout = format!("{HELLO}\nnot-json\n{WORLD}\n");
    let mut recorder = Recorder::default();
    let err = run_with_executor::<OpenCode, _>(
        &mut ReplayExecutor::from_stdout(&stdout, 0),
        ParsePolicy::default(),
        &mut recorder,
    )
    .unwrap_err();

    assert!(err.is_malformed_line());
    assert_eq!(recorder.text(), "Hello ");
    assert!(recorder.completed.is_empty());
}

struct MissingBinary;

impl ProcessExecutor for MissingBinary {
    type Error = io::Error;

    fn execute(
        &mut self,
        _on_chunk: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> Result<ExecOutput, io::Error> {
        Err(io::Error::new(io::ErrorKind::NotFound, "codex: not found"))
    }
}

#[test]
fn executor_failures_are_distinguishable() {
    let mut sink = NullSink;
    let err = run_with_executor::<Codex, _>(&mut MissingBinary, ParsePolicy::default(), &mut sink)
        .unwrap_err();
    assert!(!err.is_malformed_line());
    match err {
        ExecutionError::Executor(source) => assert_eq!(source.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn exit_code_passes_through() {
    let mut executor = ReplayExecutor::from_stdout("", 2);
    let response =
        run_with_executor::<Codex, _>(&mut executor, ParsePolicy::default(), &mut NullSink)
            .unwrap();
    assert_eq!(response.exit_code(), 2);
    assert!(!response.is_success());
    assert!(response.decoded().is_empty());
}
