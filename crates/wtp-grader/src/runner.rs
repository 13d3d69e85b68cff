//! # Test Case Runner
//!
//! One case end to end: hosts, optional relay, the supervised pair, then
//! judgement. Every case gets its own scratch directory for the logs and
//! the received file; it is removed when the case finishes.

use std::ffi::OsString;
use std::path::Path;

use wtp_log::verify_file;

use crate::config::{Binaries, HarnessConfig, Part, TestCaseSpec};
use crate::error::{CaseFailure, Role};
use crate::supervisor::{LaunchSpec, PairOutcome, ProcessHandle, Supervisor, TerminalState};
use crate::testbed::{Hosts, Testbed};

pub const OUTPUT_FILE: &str = "FILE-0.out";
const SENDER_LOG: &str = "sender.log";
const RECEIVER_LOG: &str = "receiver.log";

#[derive(Debug)]
pub struct CaseOutcome {
    pub part: Part,
    pub index: usize,
    pub possible: u32,
    pub result: Result<(), CaseFailure>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn earned(&self) -> u32 {
        if self.passed() { self.possible } else { 0 }
    }
}

pub struct CaseRunner<T> {
    testbed: T,
    harness: HarnessConfig,
    supervisor: Supervisor,
}

impl<T: Testbed> CaseRunner<T> {
    pub fn new(testbed: T, harness: HarnessConfig) -> Self {
        let supervisor = Supervisor::new(harness.head_start);
        Self {
            testbed,
            harness,
            supervisor,
        }
    }

    pub fn harness(&self) -> &HarnessConfig {
        &self.harness
    }

    pub async fn run(
        &self,
        part: Part,
        index: usize,
        case: &TestCaseSpec,
        binaries: &Binaries,
    ) -> CaseOutcome {
        tracing::info!(
            %part,
            test = index,
            netem = %case.netem,
            corrupt = ?case.corrupt,
            policies = %case.policies,
            "running"
        );
        let result = match tempfile::tempdir() {
            Ok(scratch) => self.attempt(case, binaries, scratch.path()).await,
            Err(e) => Err(CaseFailure::Scratch(e)),
        };
        match &result {
            Ok(()) => tracing::info!(%part, test = index, points = case.points, "passed"),
            Err(failure) => tracing::info!(%part, test = index, %failure, "failed"),
        }
        CaseOutcome {
            part,
            index,
            possible: case.points,
            result,
        }
    }

    async fn attempt(
        &self,
        case: &TestCaseSpec,
        binaries: &Binaries,
        scratch: &Path,
    ) -> Result<(), CaseFailure> {
        let hosts = self.testbed.setup(&case.netem)?;
        let sender_log = scratch.join(SENDER_LOG);

        let mut relay = match case.corrupt {
            Some(p) => {
                let spec = hosts.on_sender(self.relay_launch(&hosts, p));
                Some(ProcessHandle::spawn(&spec)?)
            }
            None => None,
        };
        let receiver = hosts.on_receiver(
            LaunchSpec::new("receiver", &binaries.receiver)
                .arg(self.harness.receiver_port.to_string())
                .arg(case.receiver_window.to_string())
                .arg(dir_arg(scratch))
                .arg(scratch.join(RECEIVER_LOG)),
        );
        let sender = hosts.on_sender(self.sender_launch(
            &hosts,
            relay.is_some(),
            case,
            &binaries.sender,
            &sender_log,
        ));

        let pair = self.supervisor.run_pair(&receiver, &sender, case.duration).await;
        let relay_state = match relay.as_mut() {
            Some(relay) => {
                let state = relay.poll();
                relay.terminate().await;
                Some(state)
            }
            None => None,
        };
        let pair = pair?;
        if let Some(state) = relay_state.filter(|s| !s.is_running()) {
            return Err(CaseFailure::Relay { state });
        }

        judge(&pair, case, &sender_log, &scratch.join(OUTPUT_FILE))
    }

    /// With a relay in the path the sender talks to the relay's port on its
    /// own host instead of the receiver.
    fn sender_launch(
        &self,
        hosts: &impl Hosts,
        via_relay: bool,
        case: &TestCaseSpec,
        program: &Path,
        log: &Path,
    ) -> LaunchSpec {
        let (dest_ip, dest_port) = if via_relay {
            (hosts.sender_ip(), self.harness.relay_port)
        } else {
            (hosts.receiver_ip(), self.harness.receiver_port)
        };
        LaunchSpec::new("sender", program)
            .arg(dest_ip)
            .arg(dest_port.to_string())
            .arg(case.sender_window.to_string())
            .arg(&case.file)
            .arg(log)
    }

    fn relay_launch(&self, hosts: &impl Hosts, probability: f64) -> LaunchSpec {
        LaunchSpec::new("relay", &self.harness.relay_bin)
            .arg("--src-ip")
            .arg(hosts.sender_ip())
            .arg("--dst-ip")
            .arg(hosts.receiver_ip())
            .arg("--dst-port")
            .arg(self.harness.receiver_port.to_string())
            .arg("--port")
            .arg(self.harness.relay_port.to_string())
            .arg("--corrupt")
            .arg(probability.to_string())
    }
}

/// The receiver appends file names to its output directory as given.
fn dir_arg(dir: &Path) -> OsString {
    let mut arg = dir.as_os_str().to_owned();
    arg.push("/");
    arg
}

/// Decide a finished case. A segfault, a timeout or any other fatal signal
/// ends the case before the log is read; an exit status alone does not.
pub fn judge(
    pair: &PairOutcome,
    case: &TestCaseSpec,
    sender_log: &Path,
    output: &Path,
) -> Result<(), CaseFailure> {
    let roles = [(Role::Sender, pair.sender), (Role::Receiver, pair.receiver)];

    if let Some((role, state)) = roles.into_iter().find(|(_, s)| s.is_segfault()) {
        return Err(CaseFailure::ProcessFault { role, state });
    }
    if pair.timed_out() {
        return Err(CaseFailure::Timeout {
            budget_ms: case.duration.as_millis() as u64,
        });
    }
    if let Some((role, state)) = roles
        .into_iter()
        .find(|(_, s)| matches!(s, TerminalState::Signaled(_)))
    {
        return Err(CaseFailure::ProcessFault { role, state });
    }

    if !sender_log.is_file() {
        return Err(CaseFailure::MissingLog(sender_log.to_path_buf()));
    }
    let verdict = verify_file(sender_log, &case.policies).map_err(CaseFailure::InvalidLog)?;
    tracing::debug!(summary = ?verdict.summary, "sender log checked");
    if !verdict.passed() {
        return Err(CaseFailure::PolicyViolation {
            violated: verdict.violations,
        });
    }

    if !output.is_file() {
        return Err(CaseFailure::MissingOutput(output.to_path_buf()));
    }
    if !same_contents(&case.file, output).map_err(CaseFailure::Compare)? {
        return Err(CaseFailure::OutputMismatch(case.file.clone()));
    }
    Ok(())
}

fn same_contents(expected: &Path, actual: &Path) -> std::io::Result<bool> {
    let expected_len = std::fs::metadata(expected)?.len();
    if std::fs::metadata(actual)?.len() != expected_len {
        return Ok(false);
    }
    Ok(std::fs::read(expected)? == std::fs::read(actual)?)
}
