use std::fmt;
use std::time::Duration;

use crate::config::{Binaries, Part, TestCaseSpec};
use crate::runner::{CaseOutcome, CaseRunner};
use crate::testbed::Testbed;

/// Running totals over a sequence of cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteResult {
    pub passed: usize,
    pub total: usize,
    pub points_earned: u32,
    pub points_possible: u32,
}

impl SuiteResult {
    #[must_use]
    pub fn record(self, outcome: &CaseOutcome) -> Self {
        Self {
            passed: self.passed + usize::from(outcome.passed()),
            total: self.total + 1,
            points_earned: self.points_earned + outcome.earned(),
            points_possible: self.points_possible + outcome.possible,
        }
    }

    #[must_use]
    pub fn merge(self, other: SuiteResult) -> Self {
        Self {
            passed: self.passed + other.passed,
            total: self.total + other.total,
            points_earned: self.points_earned + other.points_earned,
            points_possible: self.points_possible + other.points_possible,
        }
    }
}

impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PASSED {} out of {} tests", self.passed, self.total)?;
        write!(f, "POINTS {}/{}", self.points_earned, self.points_possible)
    }
}

/// The line printed for each finished case.
pub fn case_line(outcome: &CaseOutcome) -> String {
    match &outcome.result {
        Ok(()) => format!(
            "** PASSED {} test {} with {} points",
            outcome.part, outcome.index, outcome.possible
        ),
        Err(failure) => format!(
            "** FAILED {} test {} ({}): {failure}",
            outcome.part,
            outcome.index,
            failure.category()
        ),
    }
}

/// Spaces consecutive cases of one invocation by the rest interval, across
/// single runs and part boundaries alike.
#[derive(Debug)]
pub struct Pacer {
    rest: Duration,
    started: bool,
}

impl Pacer {
    pub fn new(rest: Duration) -> Self {
        Self {
            rest,
            started: false,
        }
    }

    /// Call before each case. Only the first call returns immediately.
    pub async fn next_case(&mut self) {
        if self.started {
            tokio::time::sleep(self.rest).await;
        }
        self.started = true;
    }
}

/// Run `cases` one after another, resting before each one that follows
/// an earlier case.
pub async fn run_suite<T: Testbed>(
    runner: &CaseRunner<T>,
    pacer: &mut Pacer,
    part: Part,
    cases: &[TestCaseSpec],
    binaries: &Binaries,
) -> SuiteResult {
    let mut result = SuiteResult::default();
    for (index, case) in cases.iter().enumerate() {
        pacer.next_case().await;
        println!("********* Running {part} test number: {index} *********");
        let outcome = runner.run(part, index, case, binaries).await;
        println!("{}", case_line(&outcome));
        result = result.record(&outcome);
    }
    result
}
