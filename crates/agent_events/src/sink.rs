use crate::response::{AgentResponse, StreamError, ToolCall};

/// Receives live notifications while an agent runs and the final response once.
///
/// Live notifications are best effort: they may be missing or duplicated relative to the
/// final [`AgentResponse`], which is the only authoritative result.
pub trait StreamSink {
    /// `false` lets an execution skip the live path entirely.
    fn wants_live_events(&self) -> bool {
        true
    }

    fn on_text(&mut self, _fragment: &str) {}

    fn on_tool_use(&mut self, _call: &ToolCall) {}

    fn on_error(&mut self, _error: &StreamError) {}

    fn on_complete(&mut self, _response: &AgentResponse) {}
}

impl<S> StreamSink for &mut S
where
    S: StreamSink + ?Sized,
{
    fn wants_live_events(&self) -> bool {
        (**self).wants_live_events()
    }

    fn on_text(&mut self, fragment: &str) {
        (**self).on_text(fragment)
    }

    fn on_tool_use(&mut self, call: &ToolCall) {
        (**self).on_tool_use(call)
    }

    fn on_error(&mut self, error: &StreamError) {
        (**self).on_error(error)
    }

    fn on_complete(&mut self, response: &AgentResponse) {
        (**self).on_complete(response)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn wants_live_events(&self) -> bool {
        false
    }
}

type TextHandler<'a> = Box<dyn FnMut(&str) + 'a>;
type ToolUseHandler<'a> = Box<dyn FnMut(&ToolCall) + 'a>;
type ErrorHandler<'a> = Box<dyn FnMut(&StreamError) + 'a>;
type CompleteHandler<'a> = Box<dyn FnMut(&AgentResponse) + 'a>;

/// [`StreamSink`] built from optional closures.
///
/// The completion handler runs at most once per sink.
#[derive(Default)]
pub struct CallbackSink<'a> {
    text: Option<TextHandler<'a>>,
    tool_use: Option<ToolUseHandler<'a>>,
    error: Option<ErrorHandler<'a>>,
    complete: Option<CompleteHandler<'a>>,
    completed: bool,
}

impl<'a> CallbackSink<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, handler: impl FnMut(&str) + 'a) -> Self {
        self.text = Some(Box::new(handler));
        self
    }

    pub fn with_tool_use(mut self, handler: impl FnMut(&ToolCall) + 'a) -> Self {
        self.tool_use = Some(Box::new(handler));
        self
    }

    pub fn with_error(mut self, handler: impl FnMut(&StreamError) + 'a) -> Self {
        self.error = Some(Box::new(handler));
        self
    }

    pub fn with_complete(mut self, handler: impl FnMut(&AgentResponse) + 'a) -> Self {
        self.complete = Some(Box::new(handler));
        self
    }
}

impl std::fmt::Debug for CallbackSink<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink")
            .field("text", &self.text.is_some())
            .field("tool_use", &self.tool_use.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .field("completed", &self.completed)
            .finish()
    }
}

impl StreamSink for CallbackSink<'_> {
    fn wants_live_events(&self) -> bool {
        self.text.is_some() || self.tool_use.is_some() || self.error.is_some()
    }

    fn on_text(&mut self, fragment: &str) {
        if let Some(handler) = self.text.as_mut() {
            handler(fragment);
        }
    }

    fn on_tool_use(&mut self, call: &ToolCall) {
        if let Some(handler) = self.tool_use.as_mut() {
            handler(call);
        }
    }

    fn on_error(&mut self, error: &StreamError) {
        if let Some(handler) = self.error.as_mut() {
            handler(error);
        }
    }

    fn on_complete(&mut self, response: &AgentResponse) {
        if self.completed {
            return;
        }
        self.completed = true;
        if let Some(handler) = self.complete.as_mut() {
            handler(response);
        }
    }
}
