// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent subprocess supervision.
//!
//! Spawns the coding agent inside the sandbox with piped stdio, pumps its
//! output through the structured-stream decoder (falling back to the regex
//! parser), and supervises it under a timeout and a cancellation token.
//! Interrupts are graceful first (SIGINT), then hard (SIGKILL) after the
//! grace window. The child is reaped on every path.

use crate::parser::OutputParser;
use crate::report::AgentReport;
use crate::sink::EventSink;
use crate::stream::{self, StreamEvent};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use vc_core::{AgentEvent, AgentId, Clock, EventType, Severity, SystemClock};

/// Lines of output retained as the resume checkpoint.
const CONTEXT_TAIL_LINES: usize = 100;

/// How long to wait for the output pumps after the child exits.
const PUMP_DRAIN_WINDOW: Duration = Duration::from_secs(5);

/// Errors from the agent runner.
#[derive(Debug, Error)]
pub enum AgentRunnerError {
    #[error("failed to spawn agent `{program}`: {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to invoke the agent once.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub agent_id: AgentId,
    /// Agent binary (or interpreter) to execute.
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Working directory; the sandbox path for claimed work.
    pub cwd: PathBuf,
    /// Natural-language brief written to the agent's stdin.
    pub brief: String,
    /// Preserved context from a prior interrupted run.
    pub checkpoint: Option<String>,
    pub timeout: Duration,
    /// Window between SIGINT and SIGKILL.
    pub kill_grace: Duration,
}

/// Liveness handle shared with the watchdog.
#[derive(Clone)]
pub struct AgentLiveness {
    last: Arc<Mutex<Instant>>,
}

impl AgentLiveness {
    fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn touch(&self) {
        *self.last.lock() = Instant::now();
    }

    /// Time since the last observed output line.
    pub fn idle_for(&self) -> Duration {
        self.last.lock().elapsed()
    }
}

impl Default for AgentLiveness {
    fn default() -> Self {
        Self::new()
    }
}

/// What the runner observed for one invocation.
#[derive(Debug)]
pub struct AgentOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub timed_out: bool,
    /// Cancellation (pause/shutdown) ended the run.
    pub interrupted: bool,
    /// The child survived the grace window and was hard-killed.
    pub killed: bool,
    pub report: Option<AgentReport>,
    pub files_modified: BTreeSet<String>,
    pub tools_used: BTreeSet<String>,
    pub lines_seen: u64,
    /// Rolling output tail, persisted as the checkpoint on interrupt.
    pub checkpoint: Option<String>,
}

struct PumpState {
    parser: OutputParser,
    report: Option<AgentReport>,
    files: BTreeSet<String>,
    tools: BTreeSet<String>,
    tail: VecDeque<String>,
    lines: u64,
}

impl PumpState {
    fn new() -> Self {
        Self {
            parser: OutputParser::new(),
            report: None,
            files: BTreeSet::new(),
            tools: BTreeSet::new(),
            tail: VecDeque::new(),
            lines: 0,
        }
    }

    fn push_tail(&mut self, line: &str) {
        if self.tail.len() == CONTEXT_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }
}

/// Supervises one agent child process at a time.
#[derive(Clone)]
pub struct AgentRunner<C: Clock = SystemClock> {
    clock: C,
    liveness: AgentLiveness,
}

impl Default for AgentRunner<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> AgentRunner<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            liveness: AgentLiveness::new(),
        }
    }

    /// Liveness signal for the watchdog.
    pub fn liveness(&self) -> AgentLiveness {
        self.liveness.clone()
    }

    /// Run the agent to completion (or timeout/cancellation).
    ///
    /// Emits `agent_spawned`, the streamed events, and a terminal
    /// `agent_completed`. Timeouts and cancellation are outcomes, not errors.
    pub async fn run(
        &self,
        invocation: AgentInvocation,
        sink: &EventSink<C>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentRunnerError> {
        let started = self.clock.monotonic();
        let brief = compose_brief(&invocation);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| AgentRunnerError::SpawnFailed {
            program: invocation.program.clone(),
            source: e,
        })?;
        let pid = child.id();
        self.liveness.touch();

        tracing::info!(
            agent_id = %invocation.agent_id,
            program = %invocation.program,
            pid,
            cwd = %invocation.cwd.display(),
            "agent spawned"
        );

        let mut spawned =
            AgentEvent::info(EventType::AgentSpawned, format!("spawned {}", invocation.program))
                .with_agent(invocation.agent_id.clone());
        if let Some(pid) = pid {
            spawned = spawned.with_field("pid", pid as u64);
        }
        if invocation.checkpoint.is_some() {
            spawned = spawned.with_field("resumed_from_checkpoint", true);
        }
        sink.emit(spawned).await;

        // Deliver the brief on stdin from its own task (an agent that never
        // reads stdin must not block the supervisor), then close it so the
        // agent sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(brief.as_bytes()).await {
                    tracing::debug!(error = %e, "agent did not consume its brief");
                }
            });
        }

        let state = Arc::new(Mutex::new(PumpState::new()));
        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_lines(
                BufReader::new(stdout),
                true,
                sink.clone(),
                Arc::clone(&state),
                self.liveness.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_lines(
                BufReader::new(stderr),
                false,
                sink.clone(),
                Arc::clone(&state),
                self.liveness.clone(),
            )));
        }

        enum Ending {
            Exited(std::process::ExitStatus),
            TimedOut,
            Cancelled,
        }

        let ending = tokio::select! {
            status = child.wait() => Ending::Exited(status?),
            _ = tokio::time::sleep(invocation.timeout) => Ending::TimedOut,
            _ = cancel.cancelled() => Ending::Cancelled,
        };

        let (timed_out, interrupted) = match &ending {
            Ending::Exited(_) => (false, false),
            Ending::TimedOut => (true, false),
            Ending::Cancelled => (false, true),
        };

        let (status, killed) = match ending {
            Ending::Exited(status) => (status, false),
            Ending::TimedOut | Ending::Cancelled => {
                terminate(&mut child, invocation.kill_grace).await?
            }
        };

        // The pumps end at pipe EOF, right after child exit.
        for pump in pumps {
            match tokio::time::timeout(PUMP_DRAIN_WINDOW, pump).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "output pump task failed"),
                Err(_) => tracing::warn!("output pump did not finish after child exit"),
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let (report, mut files, tools, tail, lines) = {
            let mut st = state.lock();
            (
                st.report.take(),
                std::mem::take(&mut st.files),
                std::mem::take(&mut st.tools),
                std::mem::take(&mut st.tail),
                st.lines,
            )
        };
        if let Some(report) = &report {
            files.extend(report.files_modified.iter().cloned());
        }

        let success = !timed_out
            && !interrupted
            && status.success()
            && report.as_ref().map(|r| r.success).unwrap_or(true);

        let mut completed = AgentEvent::new(
            EventType::AgentCompleted,
            if success { Severity::Info } else { Severity::Error },
            if success {
                "agent completed".to_string()
            } else if timed_out {
                "agent timed out".to_string()
            } else if interrupted {
                "agent interrupted".to_string()
            } else {
                "agent failed".to_string()
            },
        )
        .with_agent(invocation.agent_id.clone())
        .with_field("success", success)
        .with_field("duration_ms", duration_ms)
        .with_field("files_modified", files.len() as u64)
        .with_field("tools_used", tools.len() as u64)
        .with_field("timed_out", timed_out)
        .with_field("interrupted", interrupted)
        .with_field("killed", killed);
        if let Some(code) = status.code() {
            completed = completed.with_field("exit_code", code as i64);
        }
        sink.emit(completed).await;

        let checkpoint = if tail.is_empty() {
            None
        } else {
            Some(tail.into_iter().collect::<Vec<_>>().join("\n"))
        };

        Ok(AgentOutcome {
            success,
            exit_code: status.code(),
            duration_ms,
            timed_out,
            interrupted,
            killed,
            report,
            files_modified: files,
            tools_used: tools,
            lines_seen: lines,
            checkpoint,
        })
    }
}

/// Graceful-then-forced termination. Returns the exit status and whether the
/// hard kill was needed. Always reaps.
async fn terminate(
    child: &mut Child,
    grace: Duration,
) -> Result<(std::process::ExitStatus, bool), AgentRunnerError> {
    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            tracing::debug!(pid, error = %e, "SIGINT delivery failed (child may have exited)");
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => Ok((status?, false)),
        Err(_) => {
            tracing::warn!("agent survived grace window, hard-killing");
            child.kill().await?;
            let status = child.wait().await?;
            Ok((status, true))
        }
    }
}

fn compose_brief(invocation: &AgentInvocation) -> String {
    match &invocation.checkpoint {
        Some(checkpoint) => format!(
            "## Resumed context\n\n{checkpoint}\n\n## Task\n\n{}",
            invocation.brief
        ),
        None => invocation.brief.clone(),
    }
}

/// Pump one output stream: structured decode first (stdout only), regex
/// fallback otherwise. Locks are released before any await.
async fn pump_lines<R, C>(
    reader: BufReader<R>,
    structured: bool,
    sink: EventSink<C>,
    state: Arc<Mutex<PumpState>>,
    liveness: AgentLiveness,
) where
    R: AsyncRead + Unpin + Send + 'static,
    C: Clock,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "agent output read error");
                break;
            }
        };
        liveness.touch();

        let event = {
            let mut st = state.lock();
            st.lines += 1;
            st.push_tail(&line);

            let structured_event = if structured {
                stream::parse_stream_line(&line)
            } else {
                None
            };

            match structured_event {
                Some(StreamEvent::Result(report)) => {
                    st.report = Some(report);
                    None
                }
                Some(stream_event) => {
                    if let StreamEvent::ToolUse { tool, .. } = &stream_event {
                        st.tools.insert(tool.clone());
                    }
                    stream::to_agent_event(&stream_event, &line)
                }
                None => st.parser.parse_line(&line),
            }
        };

        let Some(event) = event else { continue };

        if event.event_type == EventType::FileModified {
            if let Some(path) = event.data.get("path").and_then(|v| v.as_str()) {
                state.lock().files.insert(path.to_string());
            }
        }

        if !sink.emit(event).await {
            tracing::debug!("event sink closed, dropping remaining agent output events");
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
