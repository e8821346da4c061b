//! Suffix matching implementation

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An address is 20 bytes, 40 hex digits.
pub const MAX_SUFFIX_LEN: usize = 40;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern is empty")]
    EmptyPattern,
    #[error("Pattern contains invalid character '{0}' (valid: 0-9, a-f)")]
    InvalidCharacter(char),
    #[error("Pattern too long (max {0} characters)")]
    PatternTooLong(usize),
}

/// A lowercase hex suffix an address must end with.
///
/// Matching is case-insensitive: the suffix is normalized to lowercase on
/// construction and compared against the raw address nibbles, never against
/// an EIP-55 checksummed rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SuffixPattern {
    value: String,
    nibbles: Vec<u8>,
}

impl SuffixPattern {
    /// Parse and validate a suffix. An optional `0x` prefix is ignored.
    pub fn new(value: &str) -> Result<Self, PatternError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        if digits.len() > MAX_SUFFIX_LEN {
            return Err(PatternError::PatternTooLong(MAX_SUFFIX_LEN));
        }

        let value = digits.to_ascii_lowercase();
        let nibbles = value
            .chars()
            .map(|c| {
                c.to_digit(16)
                    .map(|d| d as u8)
                    .ok_or(PatternError::InvalidCharacter(c))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { value, nibbles })
    }

    /// The normalized (lowercase) suffix.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.nibbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nibbles.is_empty()
    }

    /// Check raw address bytes without formatting them as hex.
    #[inline]
    pub fn matches_bytes(&self, address: &[u8]) -> bool {
        let total = address.len() * 2;
        if self.nibbles.len() > total {
            return false;
        }
        let offset = total - self.nibbles.len();
        self.nibbles.iter().enumerate().all(|(i, &want)| {
            let pos = offset + i;
            let byte = address[pos / 2];
            let got = if pos % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            got == want
        })
    }

    /// Check a hex address string, in any casing, with or without `0x`.
    pub fn matches_str(&self, address: &str) -> bool {
        address.to_ascii_lowercase().ends_with(&self.value)
    }
}

impl fmt::Display for SuffixPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl TryFrom<String> for SuffixPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<SuffixPattern> for String {
    fn from(pattern: SuffixPattern) -> Self {
        pattern.value
    }
}
