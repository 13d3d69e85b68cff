//! # Process Supervisor
//!
//! Runs one sender/receiver pair to completion under a wall-clock budget.
//!
//! The receiver starts first; the sender follows after a fixed head start.
//! The budget is a structured `tokio::time::timeout` around waiting for both,
//! so the watchdog is gone as soon as the wait finishes. When it fires,
//! every process still running is SIGKILLed and recorded as timed out.
//!
//! Every handle is killed when dropped, and [`ProcessHandle::terminate`] is
//! idempotent, so the cleanup sweep after a run can be unconditional.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::{Child, Command};
use wtp_sim::Namespace;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start {name} ({program})")]
    Spawn {
        name: String,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{name} exited before its pid could be read")]
    NoPid { name: String },
}

/// A program to launch, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl LaunchSpec {
    pub fn new(name: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The same launch, run inside `ns`.
    pub fn in_namespace(self, ns: &Namespace) -> Self {
        let (program, args) = ns.wrap(self.program, &self.args);
        Self {
            name: self.name,
            program,
            args,
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Running,
    ExitedZero,
    ExitedNonZero(i32),
    Signaled(i32),
    TimedOut,
}

impl TerminalState {
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => TerminalState::ExitedZero,
            (Some(code), _) => TerminalState::ExitedNonZero(code),
            (None, Some(signal)) => TerminalState::Signaled(signal),
            (None, None) => TerminalState::ExitedNonZero(-1),
        }
    }

    pub fn is_segfault(self) -> bool {
        self == TerminalState::Signaled(libc::SIGSEGV)
    }

    pub fn is_running(self) -> bool {
        self == TerminalState::Running
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalState::Running => f.write_str("running"),
            TerminalState::ExitedZero => f.write_str("exited with status 0"),
            TerminalState::ExitedNonZero(code) => write!(f, "exited with status {code}"),
            TerminalState::Signaled(signal) if *signal == libc::SIGSEGV => {
                write!(f, "killed by signal {signal} (segmentation fault)")
            }
            TerminalState::Signaled(signal) => write!(f, "killed by signal {signal}"),
            TerminalState::TimedOut => f.write_str("timed out"),
        }
    }
}

/// A started child process and what is known about how it ended.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    pid: u32,
    started_at: Instant,
    state: TerminalState,
    child: Child,
}

impl ProcessHandle {
    /// Start `spec` with stdin, stdout and stderr discarded.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self, SupervisorError> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                name: spec.name.clone(),
                program: spec.program.to_string_lossy().into_owned(),
                source,
            })?;
        let pid = child.id().ok_or_else(|| SupervisorError::NoPid {
            name: spec.name.clone(),
        })?;

        tracing::debug!(name = %spec.name, pid, command = %spec.command_line(), "started");
        Ok(Self {
            name: spec.name.clone(),
            pid,
            started_at: Instant::now(),
            state: TerminalState::Running,
            child,
        })
    }

    pub fn state(&self) -> TerminalState {
        self.state
    }

    /// Record an exit that already happened, without waiting.
    pub fn poll(&mut self) -> TerminalState {
        if self.state.is_running() {
            match self.child.try_wait() {
                Ok(Some(status)) => self.record(status),
                Ok(None) => {}
                Err(e) => tracing::warn!(name = %self.name, error = %e, "poll failed"),
            }
        }
        self.state
    }

    /// Wait for the process to exit on its own. Cancel safe.
    pub async fn wait(&mut self) -> TerminalState {
        if self.state.is_running() {
            match self.child.wait().await {
                Ok(status) => self.record(status),
                Err(e) => tracing::warn!(name = %self.name, error = %e, "wait failed"),
            }
        }
        self.state
    }

    /// Kill the process if it is still running, and converge on a terminal
    /// state. Never fails; an already recorded state is left untouched.
    pub async fn terminate(&mut self) -> TerminalState {
        if self.state.is_running() {
            self.kill().await;
        }
        self.state
    }

    /// The watchdog fired: kill the process if it is still running and
    /// record it as timed out.
    async fn expire(&mut self) {
        if !self.poll().is_running() {
            return;
        }
        self.kill().await;
        tracing::info!(name = %self.name, pid = self.pid, "killed on timeout");
        self.state = TerminalState::TimedOut;
    }

    async fn kill(&mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            self.record(status);
            return;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(name = %self.name, error = %e, "kill failed");
        }
        match self.child.wait().await {
            Ok(status) => self.record(status),
            Err(_) => self.state = TerminalState::Signaled(libc::SIGKILL),
        }
    }

    fn record(&mut self, status: ExitStatus) {
        self.state = TerminalState::from_status(status);
        tracing::debug!(
            name = %self.name,
            pid = self.pid,
            state = %self.state,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "exited"
        );
    }
}

/// How a sender/receiver pair ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairOutcome {
    pub sender: TerminalState,
    pub receiver: TerminalState,
    /// Time from the sender's start until both had ended.
    pub elapsed: Duration,
}

impl PairOutcome {
    pub fn timed_out(&self) -> bool {
        self.sender == TerminalState::TimedOut || self.receiver == TerminalState::TimedOut
    }
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    head_start: Duration,
}

impl Supervisor {
    pub fn new(head_start: Duration) -> Self {
        Self { head_start }
    }

    /// Run `receiver`, then `sender` after the head start, until both exit
    /// or `budget` runs out.
    pub async fn run_pair(
        &self,
        receiver: &LaunchSpec,
        sender: &LaunchSpec,
        budget: Duration,
    ) -> Result<PairOutcome, SupervisorError> {
        let mut receiver = ProcessHandle::spawn(receiver)?;
        tokio::time::sleep(self.head_start).await;
        let mut sender = ProcessHandle::spawn(sender)?;
        let started = Instant::now();

        let finished = tokio::time::timeout(budget, async {
            tokio::join!(sender.wait(), receiver.wait())
        })
        .await;

        if finished.is_err() {
            tracing::info!(budget_ms = budget.as_millis() as u64, "watchdog fired");
            sender.expire().await;
            receiver.expire().await;
        }

        let outcome = PairOutcome {
            sender: sender.terminate().await,
            receiver: receiver.terminate().await,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            sender = %outcome.sender,
            receiver = %outcome.receiver,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "pair finished"
        );
        Ok(outcome)
    }
}
