use std::{
    collections::BTreeMap,
    io,
    path::Path,
    process::Stdio,
    time::Duration,
};

use agent_events::{
    claude_code::ClaudeCode, codex::Codex, opencode::OpenCode, AgentGrammar, AgentKind,
    AgentResponse, ExecOutput, Execution, ExecutionError, OutputStream, ParsePolicy,
    ProcessExecutor, StreamSink,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, Command},
    sync::mpsc,
    time,
};
use tracing::debug;

use crate::{AgentCommand, ExecError, RunError};

const CHUNK_SIZE: usize = 4096;

type Chunk = (OutputStream, Vec<u8>);

/// Spawns `command`, hands every stdout/stderr chunk to `on_chunk` in read order and
/// returns the full capture once the process exits.
///
/// Both pipes are read, and stdin is written, on their own tasks; `on_chunk` itself always
/// runs on the caller's task. The time limit covers writing stdin, reading and waiting; on
/// expiry the child is killed.
pub async fn execute_streaming<F>(
    command: &AgentCommand,
    mut on_chunk: F,
) -> Result<ExecOutput, ExecError>
where
    F: FnMut(OutputStream, &[u8]),
{
    let mut cmd = Command::new(&command.binary);
    cmd.args(&command.args)
        .stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }
    apply_env(&mut cmd, &command.env);

    let mut child = spawn_with_retry(&mut cmd, &command.binary)?;
    debug!(
        binary = %command.binary.display(),
        args = command.args.len(),
        pid = ?child.id(),
        "spawned agent process"
    );

    let stdout = child.stdout.take().ok_or(ExecError::MissingStdout)?;
    let stderr = child.stderr.take().ok_or(ExecError::MissingStderr)?;

    let (tx, mut rx) = mpsc::channel::<Chunk>(32);
    let stdout_task = tokio::spawn(forward_chunks(stdout, OutputStream::Stdout, tx.clone()));
    let stderr_task = tokio::spawn(forward_chunks(stderr, OutputStream::Stderr, tx));
    let stdin_task = match (command.stdin.clone(), child.stdin.take()) {
        (Some(bytes), Some(stdin)) => Some(tokio::spawn(feed_stdin(stdin, bytes))),
        _ => None,
    };

    let mut captured_stdout = Vec::new();
    let mut captured_stderr = Vec::new();
    let run = async {
        while let Some((stream, chunk)) = rx.recv().await {
            on_chunk(stream, &chunk);
            match stream {
                OutputStream::Stdout => captured_stdout.extend_from_slice(&chunk),
                OutputStream::Stderr => captured_stderr.extend_from_slice(&chunk),
            }
        }
        child.wait().await
    };

    let status = match command.timeout {
        Some(limit) => {
            let waited = time::timeout(limit, run).await;
            match waited {
                Ok(status) => status.map_err(ExecError::Wait)?,
                Err(_) => {
                    if let Some(task) = &stdin_task {
                        task.abort();
                    }
                    kill(&mut child, limit).await;
                    return Err(ExecError::Timeout { timeout: limit });
                }
            }
        }
        None => run.await.map_err(ExecError::Wait)?,
    };

    if let Some(task) = stdin_task {
        task.await
            .map_err(|e| ExecError::Join(e.to_string()))?
            .map_err(ExecError::StdinWrite)?;
    }
    stdout_task
        .await
        .map_err(|e| ExecError::Join(e.to_string()))?
        .map_err(ExecError::StdoutRead)?;
    stderr_task
        .await
        .map_err(|e| ExecError::Join(e.to_string()))?
        .map_err(ExecError::StderrRead)?;

    let exit_code = status.code().unwrap_or(-1);
    debug!(
        exit_code,
        stdout_bytes = captured_stdout.len(),
        stderr_bytes = captured_stderr.len(),
        "agent process exited"
    );

    Ok(ExecOutput {
        stdout: String::from_utf8_lossy(&captured_stdout).into_owned(),
        stderr: String::from_utf8_lossy(&captured_stderr).into_owned(),
        exit_code,
    })
}

/// Runs `command` and folds its output with grammar `G`.
///
/// `sink` receives best-effort live notifications while the process runs and the final
/// response exactly once; the returned response always comes from the full capture.
pub async fn run_agent<G: AgentGrammar>(
    command: &AgentCommand,
    policy: ParsePolicy,
    sink: &mut dyn StreamSink,
) -> Result<AgentResponse, RunError> {
    let mut execution = Execution::<G>::new(policy, sink);
    let output = execute_streaming(command, |stream, chunk| execution.on_chunk(stream, chunk))
        .await
        .map_err(ExecutionError::Executor)?;
    Ok(execution.complete(&output)?)
}

/// [`run_agent`] with the grammar picked at runtime.
pub async fn run_agent_kind(
    kind: AgentKind,
    command: &AgentCommand,
    policy: ParsePolicy,
    sink: &mut dyn StreamSink,
) -> Result<AgentResponse, RunError> {
    match kind {
        AgentKind::ClaudeCode => run_agent::<ClaudeCode>(command, policy, sink).await,
        AgentKind::Codex => run_agent::<Codex>(command, policy, sink).await,
        AgentKind::OpenCode => run_agent::<OpenCode>(command, policy, sink).await,
    }
}

/// [`ProcessExecutor`] for synchronous callers; drives [`execute_streaming`] on a private
/// current-thread runtime. Must not be used from inside another tokio runtime.
#[derive(Debug)]
pub struct BlockingExecutor {
    command: AgentCommand,
    runtime: tokio::runtime::Runtime,
}

impl BlockingExecutor {
    pub fn new(command: AgentCommand) -> Result<Self, ExecError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecError::Runtime)?;
        Ok(Self { command, runtime })
    }

    pub fn command(&self) -> &AgentCommand {
        &self.command
    }
}

impl ProcessExecutor for BlockingExecutor {
    type Error = ExecError;

    fn execute(
        &mut self,
        on_chunk: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> Result<ExecOutput, ExecError> {
        self.runtime
            .block_on(execute_streaming(&self.command, |stream, chunk| on_chunk(stream, chunk)))
    }
}

async fn forward_chunks<R>(
    mut reader: R,
    stream: OutputStream,
    sender: mpsc::Sender<Chunk>,
) -> Result<(), io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        if sender.send((stream, chunk[..n].to_vec())).await.is_err() {
            // Receiver gone: the run was abandoned (timeout).
            return Ok(());
        }
    }
}

/// Writes `bytes` and closes stdin. A child that exits without reading all of it is not
/// an error; its output still counts.
async fn feed_stdin(mut stdin: ChildStdin, bytes: Vec<u8>) -> Result<(), io::Error> {
    match stdin.write_all(&bytes).await {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!(bytes = bytes.len(), "agent process closed stdin before reading it all");
            Ok(())
        }
        other => other,
    }
}

async fn kill(child: &mut Child, limit: Duration) {
    debug!(timeout = ?limit, pid = ?child.id(), "killing agent process after timeout");
    if let Err(err) = child.start_kill() {
        debug!(error = %err, "failed to signal agent process");
    }
    if let Err(err) = child.wait().await {
        debug!(error = %err, "failed to reap agent process");
    }
}

pub(crate) fn spawn_with_retry(command: &mut Command, binary: &Path) -> Result<Child, ExecError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                return Err(ExecError::MissingBinary {
                    binary: binary.to_path_buf(),
                });
            }
            Err(source) => {
                // ETXTBSY: the binary was just written and is still open for writing.
                let is_busy = source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(ExecError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }
    Err(ExecError::Spawn {
        binary: binary.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, "spawn retries exhausted"),
    })
}

fn apply_env(command: &mut Command, env: &BTreeMap<String, String>) {
    for (key, value) in env {
        command.env(key, value);
    }
}
