use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use wtp_log::PolicySet;
use wtp_sim::HostConfig;

pub const DEFAULT_POINTS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the grader must run as root")]
    NotRoot,
    #[error("{what} not found at {}", .path.display())]
    MissingBinary { what: &'static str, path: PathBuf },
    #[error("failed to read test table {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid test table: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{part} test {index}: {reason}")]
    InvalidCase {
        part: Part,
        index: usize,
        reason: String,
    },
    #[error("{part} test number {index} out of range (have {len})")]
    IndexOutOfRange { part: Part, index: usize, len: usize },
}

/// Which implementation a table grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Base,
    Opt,
}

impl Part {
    pub const fn label(self) -> &'static str {
        match self {
            Part::Base => "base",
            Part::Opt => "opt",
        }
    }

    /// Directory holding this part's `wSender` and `wReceiver`.
    pub const fn binary_dir(self) -> &'static str {
        match self {
            Part::Base => "WTP-base",
            Part::Opt => "WTP-opt",
        }
    }
}

impl std::fmt::Display for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One validated test case.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCaseSpec {
    /// Watchdog budget, counted from the sender's start.
    pub duration: Duration,
    pub sender_window: u32,
    pub receiver_window: u32,
    pub file: PathBuf,
    /// Passed to netem unchanged.
    pub netem: String,
    /// Route the sender through the corrupting relay at this probability.
    pub corrupt: Option<f64>,
    pub policies: PolicySet,
    pub points: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestCaseInput {
    /// Seconds.
    pub duration: f64,
    pub sender_window: u32,
    pub receiver_window: u32,
    /// Relative paths are resolved against the test-files directory.
    pub file: String,
    pub netem: String,
    pub corrupt: Option<f64>,
    pub policies: PolicySet,
    pub points: Option<u32>,
}

impl TestCaseInput {
    pub fn resolve(self, test_files: &Path) -> Result<TestCaseSpec, String> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(format!("duration must be positive, got {}", self.duration));
        }
        if self.sender_window == 0 || self.receiver_window == 0 {
            return Err("windows must be at least 1".into());
        }
        let file = self.file.trim();
        if file.is_empty() {
            return Err("no input file".into());
        }
        if let Some(p) = self.corrupt
            && !(0.0..=1.0).contains(&p)
        {
            return Err(format!("corruption probability {p} is outside [0, 1]"));
        }

        Ok(TestCaseSpec {
            duration: Duration::from_secs_f64(self.duration),
            sender_window: self.sender_window,
            receiver_window: self.receiver_window,
            file: test_files.join(file),
            netem: self.netem.trim().to_string(),
            corrupt: self.corrupt,
            policies: self.policies,
            points: self.points.unwrap_or(DEFAULT_POINTS),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestTablesInput {
    pub base: Vec<TestCaseInput>,
    pub opt: Vec<TestCaseInput>,
}

impl TestTablesInput {
    pub fn resolve(self, test_files: &Path) -> Result<TestTables, ConfigError> {
        let resolve_all = |part: Part, cases: Vec<TestCaseInput>| {
            cases
                .into_iter()
                .enumerate()
                .map(|(index, case)| {
                    case.resolve(test_files)
                        .map_err(|reason| ConfigError::InvalidCase {
                            part,
                            index,
                            reason,
                        })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(TestTables {
            base: resolve_all(Part::Base, self.base)?,
            opt: resolve_all(Part::Opt, self.opt)?,
        })
    }
}

/// The base and opt test tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestTables {
    pub base: Vec<TestCaseSpec>,
    pub opt: Vec<TestCaseSpec>,
}

impl TestTables {
    pub fn from_toml_str(input: &str, test_files: &Path) -> Result<Self, ConfigError> {
        let parsed: TestTablesInput = toml::from_str(input)?;
        parsed.resolve(test_files)
    }

    pub fn load(path: &Path, test_files: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input, test_files)
    }

    pub fn part(&self, part: Part) -> &[TestCaseSpec] {
        match part {
            Part::Base => &self.base,
            Part::Opt => &self.opt,
        }
    }

    pub fn case(&self, part: Part, index: usize) -> Result<&TestCaseSpec, ConfigError> {
        let cases = self.part(part);
        cases.get(index).ok_or(ConfigError::IndexOutOfRange {
            part,
            index,
            len: cases.len(),
        })
    }
}

/// Fixed parameters of a grading run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub receiver_port: u16,
    pub relay_port: u16,
    pub hosts: HostConfig,
    /// Delay between starting the receiver and starting the sender.
    pub head_start: Duration,
    /// Pause between consecutive test cases.
    pub rest_interval: Duration,
    pub relay_bin: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            receiver_port: 2333,
            relay_port: 5005,
            hosts: HostConfig::default(),
            head_start: Duration::from_secs(1),
            rest_interval: Duration::from_secs(1),
            relay_bin: PathBuf::from("wtp-relay"),
        }
    }
}

/// The sender and receiver under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binaries {
    pub sender: PathBuf,
    pub receiver: PathBuf,
}

impl Binaries {
    pub fn for_part(root: &Path, part: Part) -> Self {
        let dir = root.join(part.binary_dir());
        Self {
            sender: dir.join("wSender"),
            receiver: dir.join("wReceiver"),
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        for (what, path) in [("sender", &self.sender), ("receiver", &self.receiver)] {
            if !path.is_file() {
                return Err(ConfigError::MissingBinary {
                    what,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wtp_log::Policy;

    #[test]
    fn parse_toml_table() {
        let toml = r#"
            [[base]]
            duration = 2
            sender_window = 5
            receiver_window = 10
            file = "rand128k"
            netem = "delay 2ms reorder 20% 20%"
            policies = ["has_dupACK", "no_reTrans"]

            [[opt]]
            duration = 8.5
            sender_window = 10
            receiver_window = 10
            file = "/data/rand512k"
            netem = "delay 0.1ms"
            corrupt = 0.02
            points = 15
        "#;

        let tables = TestTables::from_toml_str(toml, Path::new("/tests")).unwrap();
        assert_eq!(tables.base.len(), 1);
        assert_eq!(tables.opt.len(), 1);

        let base = &tables.base[0];
        assert_eq!(base.duration, Duration::from_secs(2));
        assert_eq!(base.file, PathBuf::from("/tests/rand128k"));
        assert!(base.policies.contains(Policy::HasDupAck));
        assert!(base.policies.contains(Policy::NoRetrans));
        assert_eq!(base.corrupt, None);
        assert_eq!(base.points, DEFAULT_POINTS);

        let opt = &tables.opt[0];
        assert_eq!(opt.duration, Duration::from_millis(8500));
        assert_eq!(opt.file, PathBuf::from("/data/rand512k"));
        assert_eq!(opt.corrupt, Some(0.02));
        assert_eq!(opt.points, 15);
    }

    #[test]
    fn contradictory_policies_are_rejected_at_load() {
        let toml = r#"
            [[base]]
            duration = 2
            sender_window = 1
            receiver_window = 1
            file = "rand16k"
            policies = ["has_dupACK", "no_dupACK"]
        "#;
        let err = TestTables::from_toml_str(toml, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "{err}");
    }

    #[test]
    fn invalid_cases_name_their_position() {
        let toml = r#"
            [[opt]]
            duration = 2
            sender_window = 1
            receiver_window = 1
            file = "rand16k"

            [[opt]]
            duration = 0
            sender_window = 1
            receiver_window = 1
            file = "rand16k"
        "#;
        match TestTables::from_toml_str(toml, Path::new(".")).unwrap_err() {
            ConfigError::InvalidCase { part, index, .. } => {
                assert_eq!(part, Part::Opt);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn corruption_must_be_a_probability() {
        let input = TestCaseInput {
            duration: 1.0,
            sender_window: 1,
            receiver_window: 1,
            file: "f".into(),
            corrupt: Some(1.5),
            ..Default::default()
        };
        assert!(input.resolve(Path::new(".")).is_err());
    }

    #[test]
    fn out_of_range_index() {
        let tables = TestTables::default();
        let err = tables.case(Part::Base, 3).unwrap_err();
        assert_eq!(err.to_string(), "base test number 3 out of range (have 0)");
    }

    #[test]
    fn binaries_live_under_part_directories() {
        let bins = Binaries::for_part(Path::new("/submission"), Part::Opt);
        assert_eq!(bins.sender, PathBuf::from("/submission/WTP-opt/wSender"));
        assert_eq!(bins.receiver, PathBuf::from("/submission/WTP-opt/wReceiver"));
        assert!(matches!(
            bins.check(),
            Err(ConfigError::MissingBinary { what: "sender", .. })
        ));
    }
}
