//! Behavioural policies a test case can require of a sender log.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// One named check evaluated against a parsed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Policy {
    /// At least one ACK sequence number (other than the START one) repeats.
    #[serde(rename = "has_dupACK")]
    HasDupAck,
    #[serde(rename = "no_dupACK")]
    NoDupAck,
    /// At least one DATA sequence number is sent twice.
    #[serde(rename = "has_reTrans")]
    HasRetrans,
    #[serde(rename = "no_reTrans")]
    NoRetrans,
}

impl Policy {
    pub const ALL: [Policy; 4] = [
        Policy::HasDupAck,
        Policy::NoDupAck,
        Policy::HasRetrans,
        Policy::NoRetrans,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Policy::HasDupAck => "has_dupACK",
            Policy::NoDupAck => "no_dupACK",
            Policy::HasRetrans => "has_reTrans",
            Policy::NoRetrans => "no_reTrans",
        }
    }

    /// The other member of this policy's mutually exclusive pair.
    pub const fn complement(self) -> Policy {
        match self {
            Policy::HasDupAck => Policy::NoDupAck,
            Policy::NoDupAck => Policy::HasDupAck,
            Policy::HasRetrans => Policy::NoRetrans,
            Policy::NoRetrans => Policy::HasRetrans,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Policy::HasDupAck => 1 << 0,
            Policy::NoDupAck => 1 << 1,
            Policy::HasRetrans => 1 << 2,
            Policy::NoRetrans => 1 << 3,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unknown policy {0:?}")]
    Unknown(String),
    #[error("policies {0} and {1} contradict each other")]
    Conflict(Policy, Policy),
}

impl FromStr for Policy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| PolicyError::Unknown(s.to_string()))
    }
}

/// The checks requested by one test case. Contradictory pairs are refused
/// at construction, so a `PolicySet` in hand is always satisfiable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicySet {
    bits: u8,
}

impl PolicySet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn new<I>(policies: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = Policy>,
    {
        let mut set = Self::empty();
        for policy in policies {
            set.insert(policy)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, policy: Policy) -> Result<(), PolicyError> {
        if self.contains(policy.complement()) {
            return Err(PolicyError::Conflict(policy.complement(), policy));
        }
        self.bits |= policy.bit();
        Ok(())
    }

    pub const fn contains(&self, policy: Policy) -> bool {
        self.bits & policy.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Requested policies in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Policy> + '_ {
        Policy::ALL.into_iter().filter(|p| self.contains(*p))
    }
}

impl<'de> Deserialize<'de> for PolicySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Policy>::deserialize(deserializer)?;
        PolicySet::new(list).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, p) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.name())?;
        }
        f.write_str("}")
    }
}
