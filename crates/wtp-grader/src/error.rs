use std::io;
use std::path::PathBuf;

use thiserror::Error;
use wtp_log::{LogError, Policy};
use wtp_sim::NetworkError;

use crate::supervisor::{SupervisorError, TerminalState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        })
    }
}

/// Why a single test case earned no points. None of these stop the suite.
#[derive(Debug, Error)]
pub enum CaseFailure {
    #[error("{role} {state}")]
    ProcessFault { role: Role, state: TerminalState },
    #[error("did not finish within {budget_ms}ms")]
    Timeout { budget_ms: u64 },
    #[error("no sender log at {}", .0.display())]
    MissingLog(PathBuf),
    #[error("sender log rejected: {0}")]
    InvalidLog(#[source] LogError),
    #[error("policy {} violated", .violated.first().map_or("?", |p| p.name()))]
    PolicyViolation { violated: Vec<Policy> },
    #[error("no output file at {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("output differs from {}", .0.display())]
    OutputMismatch(PathBuf),
    #[error("failed to compare output: {0}")]
    Compare(#[source] io::Error),
    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),
    #[error("relay {state} before the pair finished")]
    Relay { state: TerminalState },
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("network setup failed: {0}")]
    Network(#[from] NetworkError),
}

impl CaseFailure {
    /// Short reason category printed with the failure line.
    pub fn category(&self) -> &'static str {
        match self {
            CaseFailure::ProcessFault { state, .. } if state.is_segfault() => "segmentation fault",
            CaseFailure::ProcessFault { .. } => "process fault",
            CaseFailure::Timeout { .. } => "timeout",
            CaseFailure::MissingLog(_) | CaseFailure::InvalidLog(_) => "log check failed",
            CaseFailure::PolicyViolation { .. } => "policy violation",
            CaseFailure::MissingOutput(_)
            | CaseFailure::OutputMismatch(_)
            | CaseFailure::Compare(_) => "file check failed",
            CaseFailure::Relay { .. }
            | CaseFailure::Scratch(_)
            | CaseFailure::Supervisor(_)
            | CaseFailure::Network(_) => "harness error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_violation_names_the_first_rule() {
        let failure = CaseFailure::PolicyViolation {
            violated: vec![Policy::HasDupAck, Policy::NoRetrans],
        };
        assert_eq!(failure.to_string(), "policy has_dupACK violated");
        assert_eq!(failure.category(), "policy violation");
    }

    #[test]
    fn segfaults_have_their_own_category() {
        let segv = CaseFailure::ProcessFault {
            role: Role::Sender,
            state: TerminalState::Signaled(libc::SIGSEGV),
        };
        let exit = CaseFailure::ProcessFault {
            role: Role::Receiver,
            state: TerminalState::ExitedNonZero(1),
        };
        assert_eq!(segv.category(), "segmentation fault");
        assert_eq!(exit.category(), "process fault");
        assert_eq!(exit.to_string(), "receiver exited with status 1");
    }

    #[test]
    fn dead_relay_is_a_harness_error() {
        let failure = CaseFailure::Relay {
            state: TerminalState::ExitedNonZero(1),
        };
        assert_eq!(failure.category(), "harness error");
        assert_eq!(
            failure.to_string(),
            "relay exited with status 1 before the pair finished"
        );
    }
}
