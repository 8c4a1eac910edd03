//! Shared value types for the network-policy offload control plane.
//!
//! This crate provides the small set of type-safe primitives that the
//! policy compiler and the dataplane client have in common:
//!
//! - [`Direction`]: traffic direction relative to a workload (RX/TX)
//! - [`PolicyId`]: the 16-bit per-policy rule-group identifier
//! - [`Ipv4Prefix`]: an IPv4 CIDR block with strict parsing
//! - protocol number constants ([`proto`])

mod id;
mod ip;

pub use id::{Direction, PolicyId};
pub use ip::Ipv4Prefix;

/// IP protocol numbers used by the dispatch and range-check stages.
pub mod proto {
    /// Wildcard: the policy entry matches any IP protocol.
    pub const ANY: u8 = 0;
    /// TCP (IANA protocol number 6).
    pub const TCP: u8 = 6;
    /// UDP (IANA protocol number 17).
    pub const UDP: u8 = 17;
}

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IPv4 address: {0}")]
    InvalidIpAddress(String),

    #[error("invalid CIDR: {0} (expected a.b.c.d/len)")]
    InvalidCidr(String),

    #[error("invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLen(String),

    #[error("invalid direction: {0} (expected RX or TX)")]
    InvalidDirection(String),
}
