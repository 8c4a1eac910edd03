//! Fixed-width big-endian encodings for match keys and action parameters.
//!
//! The dataplane contract encodes every scalar as a fixed-width big-endian
//! byte array and IPv4 addresses as 4-byte arrays in network order.

use std::net::Ipv4Addr;

/// Encodes an 8-bit value as a single byte.
pub fn encode_u8(value: u8) -> Vec<u8> {
    vec![value]
}

/// Encodes a 16-bit value as two bytes, big-endian.
pub fn encode_u16(value: u16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Encodes a 32-bit value as four bytes, big-endian.
pub fn encode_u32(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Encodes an IPv4 address as four bytes in network order.
pub fn encode_ipv4(addr: Ipv4Addr) -> Vec<u8> {
    addr.octets().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_widths() {
        assert_eq!(encode_u8(6), vec![6]);
        assert_eq!(encode_u16(0x0102), vec![1, 2]);
        assert_eq!(encode_u32(0x01020304), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_encode_u16_big_endian() {
        assert_eq!(encode_u16(443), vec![0x01, 0xbb]);
        assert_eq!(encode_u16(80), vec![0x00, 0x50]);
    }

    #[test]
    fn test_encode_ipv4_network_order() {
        assert_eq!(encode_ipv4(Ipv4Addr::new(10, 0, 0, 1)), vec![10, 0, 0, 1]);
    }
}
