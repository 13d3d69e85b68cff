//! # Log Verification
//!
//! Replays a sender log and decides whether it is a plausible transfer:
//! bounded length, at least one START, END and ACK, and whatever behavioural
//! policies the test case asks for.
//!
//! The verifier is incremental so callers can stream a file line by line;
//! an over-long log is rejected as soon as the limit is crossed, without
//! reading (or parsing) the rest.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::policy::{Policy, PolicySet};
use crate::record::{PacketRecord, PacketType, ParseError};

pub const MIN_LOG_LINES: usize = 5;
pub const MAX_LOG_LINES: usize = 1_000_000;

/// Structural problems. Any of these makes the whole log invalid.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("malformed line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: ParseError,
    },
    #[error("too many log lines (limit {})", MAX_LOG_LINES)]
    TooLong,
    #[error("too few log lines ({lines}, need {})", MIN_LOG_LINES)]
    TooShort { lines: usize },
    #[error("no {0} packet in log")]
    Missing(PacketType),
    #[error("failed to read log: {0}")]
    Io(#[from] io::Error),
}

/// What was observed while replaying a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub records: usize,
    /// Sequence number of the first START record.
    pub start_seq: Option<u64>,
    pub saw_start: bool,
    pub saw_end: bool,
    pub saw_ack: bool,
    pub duplicate_ack: bool,
    pub retransmission: bool,
}

impl LogSummary {
    pub const fn satisfies(&self, policy: Policy) -> bool {
        match policy {
            Policy::HasDupAck => self.duplicate_ack,
            Policy::NoDupAck => !self.duplicate_ack,
            Policy::HasRetrans => self.retransmission,
            Policy::NoRetrans => !self.retransmission,
        }
    }
}

/// Outcome of a structurally valid log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub summary: LogSummary,
    /// Every requested policy that does not hold, in declaration order.
    pub violations: Vec<Policy>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn first_violation(&self) -> Option<Policy> {
        self.violations.first().copied()
    }
}

#[derive(Debug, Default)]
pub struct LogVerifier {
    summary: LogSummary,
    seen_acks: HashSet<u64>,
    seen_data: HashSet<u64>,
}

impl LogVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> Result<(), LogError> {
        self.check_capacity()?;
        let record = PacketRecord::parse(line).map_err(|source| LogError::Malformed {
            line: self.summary.records + 1,
            source,
        })?;
        self.observe(&record);
        Ok(())
    }

    pub fn summary(&self) -> &LogSummary {
        &self.summary
    }

    fn check_capacity(&self) -> Result<(), LogError> {
        if self.summary.records >= MAX_LOG_LINES {
            return Err(LogError::TooLong);
        }
        Ok(())
    }

    fn observe(&mut self, record: &PacketRecord) {
        let s = &mut self.summary;
        s.records += 1;

        match record.packet_type {
            PacketType::Start => {
                s.saw_start = true;
                if s.start_seq.is_none() {
                    s.start_seq = Some(record.seq);
                }
            }
            PacketType::End => {
                // END is expected to reuse the START sequence number, but
                // that is not enforced while transfers carry a single file.
                s.saw_end = true;
            }
            PacketType::Data => {
                if !self.seen_data.insert(record.seq) {
                    s.retransmission = true;
                }
            }
            PacketType::Ack => {
                s.saw_ack = true;
                // ACKs for START and END share a sequence number.
                if s.start_seq != Some(record.seq) && !self.seen_acks.insert(record.seq) {
                    s.duplicate_ack = true;
                }
            }
            PacketType::Other(_) => {}
        }
    }

    /// Apply the structural rules, then every requested policy.
    pub fn finish(self, policies: &PolicySet) -> Result<Verdict, LogError> {
        let summary = self.summary;

        if summary.records < MIN_LOG_LINES {
            return Err(LogError::TooShort {
                lines: summary.records,
            });
        }
        if !summary.saw_start {
            return Err(LogError::Missing(PacketType::Start));
        }
        if !summary.saw_end {
            return Err(LogError::Missing(PacketType::End));
        }
        if !summary.saw_ack {
            return Err(LogError::Missing(PacketType::Ack));
        }

        let violations: Vec<Policy> = policies.iter().filter(|p| !summary.satisfies(*p)).collect();
        if !violations.is_empty() {
            tracing::debug!(?violations, ?summary, "log violates policies");
        }

        Ok(Verdict {
            summary,
            violations,
        })
    }
}

pub fn verify_lines<I, S>(lines: I, policies: &PolicySet) -> Result<Verdict, LogError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut verifier = LogVerifier::new();
    for line in lines {
        verifier.push_line(line.as_ref())?;
    }
    verifier.finish(policies)
}

pub fn verify_reader<R: BufRead>(reader: R, policies: &PolicySet) -> Result<Verdict, LogError> {
    let mut verifier = LogVerifier::new();
    for line in reader.lines() {
        verifier.push_line(&line?)?;
    }
    verifier.finish(policies)
}

pub fn verify_file(path: &Path, policies: &PolicySet) -> Result<Verdict, LogError> {
    let file = File::open(path)?;
    verify_reader(BufReader::new(file), policies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: [&str; 6] = [
        "0 5 0 0", "2 6 100 12", "2 7 100 15", "3 6 0 0", "3 7 0 0", "1 5 0 0",
    ];

    fn policies(list: &[Policy]) -> PolicySet {
        PolicySet::new(list.iter().copied()).unwrap()
    }

    #[test]
    fn fewer_than_five_lines_is_too_short() {
        let err = verify_lines(&BASIC[..4], &PolicySet::empty()).unwrap_err();
        assert!(matches!(err, LogError::TooShort { lines: 4 }));

        let err = verify_lines(Vec::<&str>::new(), &PolicySet::empty()).unwrap_err();
        assert!(matches!(err, LogError::TooShort { lines: 0 }));
    }

    #[test]
    fn short_log_is_rejected_even_if_complete() {
        let lines = ["0 5 0 0", "3 5 0 0", "1 5 0 0", "3 5 0 0"];
        assert!(matches!(
            verify_lines(lines, &PolicySet::empty()),
            Err(LogError::TooShort { lines: 4 })
        ));
    }

    #[test]
    fn missing_start_end_or_ack_is_rejected() {
        let no_start = ["2 6 1 0", "2 7 1 0", "3 6 0 0", "3 7 0 0", "1 5 0 0"];
        let no_end = ["0 5 0 0", "2 6 1 0", "2 7 1 0", "3 6 0 0", "3 7 0 0"];
        let no_ack = ["0 5 0 0", "2 6 1 0", "2 7 1 0", "2 8 1 0", "1 5 0 0"];

        for (lines, missing) in [
            (no_start, PacketType::Start),
            (no_end, PacketType::End),
            (no_ack, PacketType::Ack),
        ] {
            for set in [
                PolicySet::empty(),
                policies(&[Policy::NoDupAck, Policy::NoRetrans]),
            ] {
                match verify_lines(lines, &set) {
                    Err(LogError::Missing(t)) => assert_eq!(t, missing),
                    other => panic!("expected missing {missing}, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn malformed_line_reports_its_position() {
        let mut lines = BASIC.to_vec();
        lines.insert(2, "2 x 100 0");
        match verify_lines(lines, &PolicySet::empty()) {
            Err(LogError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn blank_line_invalidates_log() {
        let mut lines = BASIC.to_vec();
        lines.push("");
        assert!(matches!(
            verify_lines(lines, &PolicySet::empty()),
            Err(LogError::Malformed { line: 7, .. })
        ));
    }

    #[test]
    fn ack_for_start_sequence_is_not_a_duplicate() {
        let lines = [
            "0 5 0 0", "3 5 0 0", "2 6 1 0", "3 6 0 0", "1 5 0 0", "3 5 0 0",
        ];
        let verdict = verify_lines(lines, &PolicySet::empty()).unwrap();
        assert_eq!(verdict.summary.start_seq, Some(5));
        assert!(!verdict.summary.duplicate_ack);
    }

    #[test]
    fn first_start_fixes_the_excluded_sequence() {
        let lines = [
            "0 5 0 0", "0 9 0 0", "3 9 0 0", "3 9 0 0", "2 6 1 0", "1 5 0 0",
        ];
        let verdict = verify_lines(lines, &PolicySet::empty()).unwrap();
        assert_eq!(verdict.summary.start_seq, Some(5));
        assert!(verdict.summary.duplicate_ack);
    }

    #[test]
    fn repeated_data_is_a_retransmission() {
        let lines = ["0 5 0 0", "2 6 1 0", "2 6 1 0", "3 7 0 0", "1 5 0 0"];
        let verdict = verify_lines(lines, &policies(&[Policy::HasRetrans])).unwrap();
        assert!(verdict.passed());

        let verdict = verify_lines(lines, &policies(&[Policy::NoRetrans])).unwrap();
        assert_eq!(verdict.violations, vec![Policy::NoRetrans]);
    }

    #[test]
    fn all_violations_are_reported() {
        let verdict = verify_lines(
            BASIC,
            &policies(&[Policy::HasDupAck, Policy::HasRetrans]),
        )
        .unwrap();
        assert_eq!(
            verdict.violations,
            vec![Policy::HasDupAck, Policy::HasRetrans]
        );
        assert_eq!(verdict.first_violation(), Some(Policy::HasDupAck));
    }

    #[test]
    fn unknown_types_only_count_as_lines() {
        let lines = ["0 5 0 0", "9 1 0 0", "9 1 0 0", "3 6 0 0", "1 5 0 0"];
        let verdict = verify_lines(lines, &PolicySet::empty()).unwrap();
        assert_eq!(verdict.summary.records, 5);
        assert!(!verdict.summary.retransmission);
    }

    #[test]
    fn reader_and_lines_agree() {
        let text = BASIC.join("\n") + "\n";
        let from_reader = verify_reader(text.as_bytes(), &PolicySet::empty()).unwrap();
        let from_lines = verify_lines(BASIC, &PolicySet::empty()).unwrap();
        assert_eq!(from_reader, from_lines);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let text = BASIC.join("\r\n");
        assert!(verify_reader(text.as_bytes(), &PolicySet::empty()).is_ok());
    }
}
