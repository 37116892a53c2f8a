use std::{collections::BTreeMap, ffi::OsString, path::PathBuf, time::Duration};

use agent_events::AgentKind;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// What to run: binary, arguments, environment, working directory and time limit.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub(crate) binary: PathBuf,
    pub(crate) args: Vec<OsString>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) stdin: Option<Vec<u8>>,
}

impl AgentCommand {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout: Some(DEFAULT_TIMEOUT),
            stdin: None,
        }
    }

    /// Command for the agent's conventional binary name, resolved through `PATH`.
    pub fn for_agent(kind: AgentKind) -> Self {
        let binary = match kind {
            AgentKind::ClaudeCode => "claude",
            AgentKind::Codex => "codex",
            AgentKind::OpenCode => "opencode",
        };
        Self::new(binary)
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// `None` waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bytes written to the child's stdin before its output is read.
    pub fn stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
