//! # Packet Records
//!
//! One line of a sender event log describes one packet the sender put on
//! (or took off) the wire:
//!
//! ```text
//! <type> <seq> <len> <checksum>
//! ```
//!
//! All four fields are unsigned decimal integers. A single line that does
//! not match invalidates the whole log, so the parser is strict about digits
//! and never guesses. The checksum is carried as its digits and never
//! interpreted, so it has no width limit.

use std::fmt;

use thiserror::Error;

/// Packet role as recorded in the log's first column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Start,
    End,
    Data,
    Ack,
    /// Numeric but outside 0..=3. Structurally valid, counts toward nothing.
    Other(u64),
}

impl PacketType {
    pub const fn from_code(code: u64) -> Self {
        match code {
            0 => PacketType::Start,
            1 => PacketType::End,
            2 => PacketType::Data,
            3 => PacketType::Ack,
            other => PacketType::Other(other),
        }
    }

    pub const fn code(self) -> u64 {
        match self {
            PacketType::Start => 0,
            PacketType::End => 1,
            PacketType::Data => 2,
            PacketType::Ack => 3,
            PacketType::Other(code) => code,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Start => f.write_str("START"),
            PacketType::End => f.write_str("END"),
            PacketType::Data => f.write_str("DATA"),
            PacketType::Ack => f.write_str("ACK"),
            PacketType::Other(code) => write!(f, "type {code}"),
        }
    }
}

/// A single observed protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub packet_type: PacketType,
    pub seq: u64,
    pub length: u64,
    /// Opaque; only required to be digits.
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected 4 fields, found {found}")]
    MissingFields { found: usize },
    #[error("{field} is not an unsigned integer: {token:?}")]
    NotNumeric { field: &'static str, token: String },
    #[error("{field} out of range: {token}")]
    OutOfRange { field: &'static str, token: String },
}

const FIELDS: [&str; 4] = ["type", "seq", "length", "checksum"];

impl PacketRecord {
    /// Parse one log line. Tokens after the fourth are ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut tokens = line.split_whitespace();
        let mut fields = [""; 4];
        for (idx, slot) in fields.iter_mut().enumerate() {
            *slot = tokens
                .next()
                .ok_or(ParseError::MissingFields { found: idx })?;
        }

        let [code, seq, length, checksum] = fields;
        Ok(PacketRecord {
            packet_type: PacketType::from_code(parse_unsigned(FIELDS[0], code)?),
            seq: parse_unsigned(FIELDS[1], seq)?,
            length: parse_unsigned(FIELDS[2], length)?,
            checksum: digits(FIELDS[3], checksum)?.to_string(),
        })
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.packet_type.code(),
            self.seq,
            self.length,
            self.checksum
        )
    }
}

// `u64::from_str` accepts a leading '+', the log format does not.
fn digits<'a>(field: &'static str, token: &'a str) -> Result<&'a str, ParseError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NotNumeric {
            field,
            token: token.to_string(),
        });
    }
    Ok(token)
}

fn parse_unsigned(field: &'static str, token: &str) -> Result<u64, ParseError> {
    digits(field, token)?.parse::<u64>().map_err(|_| ParseError::OutOfRange {
        field,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_fields_positionally() {
        let rec = PacketRecord::parse("2 6 100 12").unwrap();
        assert_eq!(
            rec,
            PacketRecord {
                packet_type: PacketType::Data,
                seq: 6,
                length: 100,
                checksum: "12".into(),
            }
        );
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let rec = PacketRecord::parse("  3\t7   0 0  \r").unwrap();
        assert_eq!(rec.packet_type, PacketType::Ack);
        assert_eq!(rec.seq, 7);
    }

    #[test]
    fn ignores_tokens_past_the_fourth() {
        let rec = PacketRecord::parse("1 5 0 0 trailing").unwrap();
        assert_eq!(rec.packet_type, PacketType::End);
    }

    #[test]
    fn short_lines_are_rejected() {
        assert_eq!(
            PacketRecord::parse("0 5 0"),
            Err(ParseError::MissingFields { found: 3 })
        );
        assert_eq!(
            PacketRecord::parse(""),
            Err(ParseError::MissingFields { found: 0 })
        );
    }

    #[test]
    fn signs_and_letters_are_not_numeric() {
        for line in ["-1 5 0 0", "0 +5 0 0", "0 5 0x1 0", "0 5 0 abc", "0 5.0 0 0"] {
            assert!(
                matches!(
                    PacketRecord::parse(line),
                    Err(ParseError::NotNumeric { .. })
                ),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn values_past_32_bits_parse() {
        let rec = PacketRecord::parse("0 5 0 4294967296").unwrap();
        assert_eq!(rec.checksum, "4294967296");

        let rec = PacketRecord::parse("2 99999999999 4294967296 1").unwrap();
        assert_eq!(rec.seq, 99_999_999_999);
        assert_eq!(rec.length, 1 << 32);
    }

    #[test]
    fn checksum_is_never_interpreted() {
        let long = "1".repeat(40);
        let rec = PacketRecord::parse(&format!("3 1 0 {long}")).unwrap();
        assert_eq!(rec.checksum, long);
        assert_eq!(rec.to_string(), format!("3 1 0 {long}"));
    }

    #[test]
    fn seq_past_64_bits_is_out_of_range() {
        let err = PacketRecord::parse("2 18446744073709551616 0 0").unwrap_err();
        assert!(matches!(err, ParseError::OutOfRange { field: "seq", .. }));
    }

    #[test]
    fn unknown_type_codes_parse() {
        let rec = PacketRecord::parse("7 1 0 0").unwrap();
        assert_eq!(rec.packet_type, PacketType::Other(7));
        assert_eq!(rec.to_string(), "7 1 0 0");
    }
}
