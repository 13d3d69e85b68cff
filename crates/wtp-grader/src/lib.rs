//! Conformance grading for WTP sender/receiver pairs.
//!
//! A case builds an emulated two-host network, optionally puts the
//! corrupting relay between the hosts, runs the pair under a time budget and
//! then judges the sender's log and the received file. Suites run cases
//! sequentially and fold the results.

pub mod config;
pub mod error;
pub mod runner;
pub mod suite;
pub mod supervisor;
pub mod testbed;
pub mod testdefs;

pub use config::{Binaries, ConfigError, HarnessConfig, Part, TestCaseSpec, TestTables};
pub use error::{CaseFailure, Role};
pub use runner::{CaseOutcome, CaseRunner, judge};
pub use suite::{Pacer, SuiteResult, case_line, run_suite};
pub use supervisor::{
    LaunchSpec, PairOutcome, ProcessHandle, Supervisor, SupervisorError, TerminalState,
};
pub use testbed::{Hosts, Loopback, Netns, Testbed};
