//! Process seam around the external media tool (yt-dlp).
//!
//! Controllers never build a `Command` themselves. They hand an argument list
//! to a [`MediaTool`] and get back either the buffered output or a byte stream
//! that owns the child process. Dropping that stream kills the child, which is
//! how a client disconnect turns into process cleanup.

use std::{
    io,
    path::PathBuf,
    pin::Pin,
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, Command},
    task::JoinHandle,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// How much trailing stderr text is kept for failure reports.
const STDERR_TAIL_LIMIT: usize = 8 * 1024;

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("media tool i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl ToolError {
    /// Diagnostic text for logs and the metadata error body. Prefers the
    /// tool's own stderr when it printed something.
    pub fn details(&self) -> String {
        match self {
            ToolError::Exited { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Live stdout of a spawned tool. The child is killed when `chunks` is dropped
/// before the process exits.
pub struct ToolStream {
    pub pid: Option<u32>,
    pub chunks: ByteStream,
}

#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Runs the tool to completion and buffers both output streams. A non-zero
    /// exit is reported as [`ToolError::Exited`].
    async fn run(&self, args: Vec<String>) -> Result<ToolOutput, ToolError>;

    /// Spawns the tool and returns its stdout as a stream. A non-zero exit
    /// shows up as the final `Err` item of the stream.
    fn stream(&self, args: Vec<String>) -> Result<ToolStream, ToolError>;
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    /// Asks the tool for its version string; used as a startup probe.
    pub async fn version(&self) -> Result<String, ToolError> {
        let output = self.run(vec!["--version".to_string()]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaTool for YtDlp {
    async fn run(&self, args: Vec<String>) -> Result<ToolOutput, ToolError> {
        let program = self.program_name();
        debug!("running {} {:?}", program, args);
        let mut cmd = self.command(&args);
        let output = cmd
            .output()
            .await
            .map_err(|source| ToolError::Launch {
                program: program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ToolError::Exited {
                program,
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }

    fn stream(&self, args: Vec<String>) -> Result<ToolStream, ToolError> {
        let program = self.program_name();
        debug!("streaming {} {:?}", program, args);
        let mut child = self
            .command(&args)
            .spawn()
            .map_err(|source| ToolError::Launch {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr_tail = child.stderr.take().map(drain_stderr);
        let mut guard = ChildGuard {
            child,
            pid,
            finished: false,
        };

        let chunks: ByteStream = Box::pin(async_stream::try_stream! {
            let mut reader = ReaderStream::new(stdout);
            while let Some(chunk) = reader.next().await {
                yield chunk?;
            }

            let status = guard.wait().await?;
            let stderr = match stderr_tail {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };
            if !status.success() {
                warn!("{} (pid {:?}) exited with {}: {}", program, pid, status, stderr.trim());
                Err::<(), io::Error>(io::Error::other(format!("{program} exited with {status}")))?;
            }
        });

        Ok(ToolStream { pid, chunks })
    }
}

/// Owns the streaming child. Killing happens in `Drop` so that every way of
/// abandoning the stream (client disconnect, handler error, panic) cleans up.
struct ChildGuard {
    child: Child,
    pid: Option<u32>,
    finished: bool,
}

impl ChildGuard {
    async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.finished = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.child.start_kill() {
            Ok(()) => info!("stream abandoned, killed media tool (pid {:?})", self.pid),
            Err(err) => warn!("failed to kill media tool (pid {:?}): {}", self.pid, err),
        }
    }
}

/// Reads stderr to EOF. Lines are taken as raw bytes since the tool may print
/// text that is not UTF-8; stopping early would close the pipe and SIGPIPE it.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut tail = String::new();
        let mut reader = BufReader::new(stderr);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    let text = text.trim_end_matches(['\r', '\n']);
                    debug!("yt-dlp: {}", text);
                    push_tail(&mut tail, text);
                }
                Err(err) => {
                    warn!("reading media tool stderr failed: {}", err);
                    // Keep the pipe open until the child closes it.
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }
        tail
    })
}

fn push_tail(tail: &mut String, line: &str) {
    tail.push_str(line);
    tail.push('\n');
    if tail.len() > STDERR_TAIL_LIMIT {
        let mut cut = tail.len() - STDERR_TAIL_LIMIT;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail.drain(..cut);
    }
}
