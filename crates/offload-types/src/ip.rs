//! IPv4 CIDR prefix with strict parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::ParseError;

/// An IPv4 prefix in CIDR notation (e.g. 10.0.0.0/8).
///
/// Parsing is strict: the "/len" part is mandatory and the length must be
/// 0-32. Policy rules always carry an explicit length, so a bare address
/// is a caller contract violation and is rejected rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Prefix {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Prefix {
    /// Creates a new prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidPrefixLen(prefix_len.to_string()));
        }
        Ok(Ipv4Prefix {
            address,
            prefix_len,
        })
    }

    /// Returns the network address.
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the address as a 4-byte array in network order.
    pub const fn octets(&self) -> [u8; 4] {
        self.address.octets()
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidCidr(s.to_string()))?;

        let address = addr_str
            .parse::<Ipv4Addr>()
            .map_err(|_| ParseError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_len = len_str
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidPrefixLen(len_str.to_string()))?;

        Ipv4Prefix::new(address, prefix_len)
    }
}
