//! Child-process supervision for worker programs.

use std::collections::VecDeque;
use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::ProgressEvent;
use super::launcher::WorkerLauncher;
use super::stream::EventStream;
use super::{RoundRunner, SupervisorError};
use crate::worker::{ProtocolLine, WorkerProgram, EXIT_PARTIAL, EXIT_UNREACHABLE};

/// Default pause between the interrupt and the forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Default number of stderr lines kept for error messages.
pub const DEFAULT_STDERR_TAIL: usize = 20;

/// Time allowed for stderr to drain once the worker has exited.
const STDERR_DRAIN: Duration = Duration::from_millis(250);

/// Supervision limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Wall-clock limit for one round; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Time between the graceful interrupt and the forced kill.
    pub grace_period: Duration,
    /// Number of trailing stderr lines kept for error messages.
    pub stderr_tail: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            stderr_tail: DEFAULT_STDERR_TAIL,
        }
    }
}

/// Runs worker programs as child processes and turns their stdout into
/// [`ProgressEvent`]s.
///
/// The program text is written to the child's stdin; the launcher decides
/// what interprets it and where (host or container).
///
/// # Example
///
/// ```ignore
/// let supervisor = ExecutionSupervisor::new(WorkerLauncher::parse("python3 -u -")?);
/// let mut events = supervisor.run(&program, CancellationToken::new())?;
/// while let Some(event) = events.next().await {
///     println!("{}", event);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionSupervisor {
    launcher: WorkerLauncher,
    config: SupervisorConfig,
}

impl ExecutionSupervisor {
    pub fn new(launcher: WorkerLauncher) -> Self {
        Self::with_config(launcher, SupervisorConfig::default())
    }

    pub fn with_config(launcher: WorkerLauncher, config: SupervisorConfig) -> Self {
        Self { launcher, config }
    }

    pub fn launcher(&self) -> &WorkerLauncher {
        &self.launcher
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Launches `program` and returns its event stream.
    ///
    /// Must be called from within a tokio runtime. The child is killed if
    /// the returned stream is dropped before the run ends.
    pub fn run(
        &self,
        program: &WorkerProgram,
        cancel: CancellationToken,
    ) -> Result<EventStream, SupervisorError> {
        let mut child = self
            .launcher
            .command()
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                launcher: self.launcher.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(SupervisorError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SupervisorError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SupervisorError::MissingPipe("stderr"))?;

        info!(
            launcher = %self.launcher,
            pid = child.id(),
            template = program.template(),
            tiles = program.tile_count(),
            "Worker started"
        );

        let (tx, rx) = mpsc::channel(1);
        let writer = tokio::spawn(feed_program(stdin, program.source().to_owned()));
        let tail = Arc::new(Mutex::new(StderrTail::new(self.config.stderr_tail)));
        let stderr_task = tokio::spawn(collect_stderr(stderr, Arc::clone(&tail)));

        let session = Session {
            child,
            tx,
            cancel,
            config: self.config.clone(),
            writer,
            stderr_task,
            tail,
        };
        tokio::spawn(session.supervise(stdout));

        Ok(EventStream::new(rx))
    }
}

impl RoundRunner for ExecutionSupervisor {
    fn start_round(
        &self,
        program: &WorkerProgram,
        cancel: CancellationToken,
    ) -> Result<EventStream, SupervisorError> {
        self.run(program, cancel)
    }
}

/// Why the read loop stopped.
enum Stop {
    Eof,
    Cancelled,
    TimedOut,
    Abandoned,
}

struct Session {
    child: Child,
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
    config: SupervisorConfig,
    writer: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
    tail: Arc<Mutex<StderrTail>>,
}

impl Session {
    async fn supervise<R>(mut self, stdout: R)
    where
        R: AsyncRead + Unpin,
    {
        let deadline = self.config.timeout.map(|timeout| Instant::now() + timeout);
        let expired = until(deadline);
        tokio::pin!(expired);

        let mut stdout = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut done: Option<ProgressEvent> = None;

        let stop = loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Stop::Cancelled,
                _ = &mut expired => break Stop::TimedOut,
                line = read_line(&mut stdout, &mut buf) => line,
            };

            let event = match line {
                Ok(Some(line)) => match ProtocolLine::parse(&line) {
                    done_line @ ProtocolLine::Done { .. } => {
                        done = Some(done_line.into());
                        continue;
                    }
                    other => ProgressEvent::from(other),
                },
                Ok(None) => break Stop::Eof,
                Err(e) => {
                    warn!(error = %e, "Failed to read worker output");
                    break Stop::Eof;
                }
            };

            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Stop::Cancelled,
                _ = &mut expired => break Stop::TimedOut,
                sent = self.tx.send(event) => sent,
            };
            if sent.is_err() {
                break Stop::Abandoned;
            }
        };

        let status = match stop {
            Stop::Eof => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                _ = &mut expired => None,
                status = self.child.wait() => Some(status),
            },
            _ => None,
        };

        let terminal = match (stop, status) {
            (Stop::Eof, Some(Ok(status))) => Some(self.finish(status, done).await),
            (Stop::Eof, Some(Err(e))) => Some(ProgressEvent::RunError {
                message: format!("failed to wait for worker: {}", e),
            }),
            (Stop::Abandoned, _) => {
                debug!("Event stream dropped, stopping worker");
                self.terminate().await;
                None
            }
            (Stop::TimedOut, _) => {
                warn!(timeout = ?self.config.timeout, "Worker timed out");
                self.terminate().await;
                Some(ProgressEvent::cancelled())
            }
            // Cancelled, or cancelled/timed out while waiting for exit
            _ => {
                info!("Worker cancelled");
                self.terminate().await;
                Some(ProgressEvent::cancelled())
            }
        };

        self.writer.abort();
        if let Some(event) = terminal {
            let _ = self.tx.send(event).await;
        }
    }

    /// Terminal event for a worker that exited on its own.
    async fn finish(&mut self, status: ExitStatus, done: Option<ProgressEvent>) -> ProgressEvent {
        let _ = tokio::time::timeout(STDERR_DRAIN, &mut self.stderr_task).await;
        let stderr = self.stderr_summary();

        let event = match (status.code(), done) {
            (Some(EXIT_UNREACHABLE), _) => ProgressEvent::RunError {
                message: format!("rendering endpoint unreachable{}", stderr),
            },
            (Some(0) | Some(EXIT_PARTIAL), Some(done)) => done,
            (_, Some(_)) => ProgressEvent::RunError {
                message: format!("worker exited with {}{}", status, stderr),
            },
            (_, None) => ProgressEvent::RunError {
                message: format!("worker exited with {} before DONE{}", status, stderr),
            },
        };

        match &event {
            ProgressEvent::RunError { message } => {
                warn!(status = %status, message = %message, "Worker failed")
            }
            _ => info!(status = %status, "Worker finished"),
        }
        event
    }

    /// Interrupt, wait out the grace period, then kill.
    async fn terminate(&mut self) {
        interrupt(&self.child);
        match tokio::time::timeout(self.config.grace_period, self.child.wait()).await {
            Ok(Ok(status)) => debug!(status = %status, "Worker stopped after interrupt"),
            Ok(Err(e)) => warn!(error = %e, "Failed to wait for interrupted worker"),
            Err(_) => {
                warn!(
                    grace_period = ?self.config.grace_period,
                    "Worker ignored interrupt, killing"
                );
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Failed to kill worker");
                }
            }
        }
        self.stderr_task.abort();
    }

    fn stderr_summary(&self) -> String {
        match self.tail.lock() {
            Ok(tail) if !tail.is_empty() => format!(": {}", tail.joined()),
            _ => String::new(),
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs
        // to a child we have not yet reaped.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
        if rc != 0 {
            debug!(pid, "SIGINT delivery failed");
        }
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) {}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn feed_program(mut stdin: ChildStdin, source: String) {
    if let Err(e) = stdin.write_all(source.as_bytes()).await {
        debug!(error = %e, "Worker closed stdin before the program was written");
        return;
    }
    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "Failed to close worker stdin");
    }
}

/// Reads one line, replacing invalid UTF-8 so undecodable output never
/// ends the stream. `Ok(None)` at end of file.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(decode_line(buf)))
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

async fn collect_stderr<R>(stderr: R, tail: Arc<Mutex<StderrTail>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = read_line(&mut reader, &mut buf).await {
        debug!(line = %line, "Worker stderr");
        if let Ok(mut tail) = tail.lock() {
            tail.push(line);
        }
    }
}

/// Last `capacity` lines of worker stderr.
#[derive(Debug)]
struct StderrTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl StderrTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join(" | ")
    }
}
