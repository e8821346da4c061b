//! Address encoding utilities: hex parsing and EIP-55 checksums

use alloy_primitives::{Address, B256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid hex in {0}")]
    InvalidHex(&'static str),
    #[error("Invalid length for {what}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Decode a hex string with an optional `0x` prefix.
pub fn parse_hex(what: &'static str, input: &str) -> Result<Vec<u8>, EncodingError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|_| EncodingError::InvalidHex(what))
}

fn parse_fixed<const N: usize>(what: &'static str, input: &str) -> Result<[u8; N], EncodingError> {
    let bytes = parse_hex(what, input)?;
    bytes.as_slice().try_into().map_err(|_| EncodingError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

/// Parse a 20-byte address. Checksum casing is accepted but not enforced.
pub fn parse_address(input: &str) -> Result<Address, EncodingError> {
    parse_fixed::<20>("address", input).map(Address::from)
}

/// Parse a 32-byte hash.
pub fn parse_b256(input: &str) -> Result<B256, EncodingError> {
    parse_fixed::<32>("hash", input).map(B256::from)
}

/// EIP-55 checksum encoding for Ethereum addresses
pub fn eip55_checksum(address: &[u8]) -> String {
    use crate::hash::keccak256;

    let hex_addr = hex::encode(address);
    let hash = keccak256(hex_addr.as_bytes());

    let mut result = String::with_capacity(2 + hex_addr.len());
    result.push_str("0x");

    for (i, c) in hex_addr.chars().enumerate() {
        let hash_nibble = if i % 2 == 0 {
            (hash[i / 2] >> 4) & 0x0F
        } else {
            hash[i / 2] & 0x0F
        };

        if hash_nibble >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}
