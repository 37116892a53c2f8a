#![allow(dead_code)]

use std::path::PathBuf;

use agent_events::{
    AgentResponse, OutputStream, ReplayExecutor, StreamError, StreamSink, ToolCall,
};

pub fn fixture(agent: &str, name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(agent)
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

/// Replays `stdout` in chunks of `size` bytes, regardless of line boundaries.
pub fn chunked(stdout: &str, size: usize, exit_code: i32) -> ReplayExecutor {
    stdout
        .as_bytes()
        .chunks(size)
        .fold(ReplayExecutor::new(exit_code), |executor, chunk| {
            executor.chunk(OutputStream::Stdout, chunk)
        })
}

/// Sink that keeps every notification it receives.
#[derive(Debug, Default)]
pub struct Recorder {
    pub texts: Vec<String>,
    pub tools: Vec<ToolCall>,
    pub errors: Vec<StreamError>,
    pub completed: Vec<AgentResponse>,
}

impl Recorder {
    pub fn text(&self) -> String {
        self.texts.concat()
    }
}

impl StreamSink for Recorder {
    fn on_text(&mut self, fragment: &str) {
        self.texts.push(fragment.to_string());
    }

    fn on_tool_use(&mut self, call: &ToolCall) {
        self.tools.push(call.clone());
    }

    fn on_error(&mut self, error: &StreamError) {
        self.errors.push(error.clone());
    }

    fn on_complete(&mut self, response: &AgentResponse) {
        self.completed.push(response.clone());
    }
}
