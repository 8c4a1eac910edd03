//! Policy identifiers and traffic direction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseError;

/// Traffic direction relative to the workload endpoint.
///
/// `Rx` is ingress (traffic arriving at the workload), `Tx` is egress
/// (traffic leaving it). The dataplane keeps a separate table instance per
/// direction, and the address field a stage matches on flips with the
/// direction: the dispatch stage matches the workload's own address while
/// the set-membership stage matches the peer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Ingress ("RX").
    Rx,
    /// Egress ("TX").
    Tx,
}

impl Direction {
    /// Returns the wire-format name ("RX" or "TX").
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rx => "RX",
            Direction::Tx => "TX",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RX" => Ok(Direction::Rx),
            "TX" => Ok(Direction::Tx),
            _ => Err(ParseError::InvalidDirection(s.to_string())),
        }
    }
}

/// The 16-bit identifier of one rule-group within a policy.
///
/// A single value serves three roles in the dataplane: the policy id
/// carried in packet metadata, the exact-match key of the set-membership
/// and port-range tables, and the range-group id chaining the dispatch
/// stage to its port-range entry. Keeping it one type prevents the three
/// uses from drifting apart.
///
/// Because the set-membership result is a single byte merged by bitwise-OR,
/// at most [`PolicyId::MAX_RULES`] rules can be attributed to one id; the
/// reconciler validates this before touching any table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PolicyId(u16);

impl PolicyId {
    /// Maximum number of rules representable per id (one bit each in the
    /// 8-bit membership mask).
    pub const MAX_RULES: usize = 8;

    /// Creates a new policy id.
    pub const fn new(id: u16) -> Self {
        PolicyId(id)
    }

    /// Returns the raw 16-bit value.
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for PolicyId {
    fn from(id: u16) -> Self {
        PolicyId(id)
    }
}

impl From<PolicyId> for u16 {
    fn from(id: PolicyId) -> Self {
        id.0
    }
}
