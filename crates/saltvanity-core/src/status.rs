//! Search identity and externally visible status

use std::fmt;

use saltvanity_crypto::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Opaque search identifier, derived from the creation time in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(String);

impl SearchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is safe to use as a file name.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SearchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Half-open salt range `[start_salt, end_salt)` a search dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchedRange {
    pub start_salt: U256,
    pub end_salt: U256,
}

/// What `poll` reports, and what gets persisted once a search is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SearchStatus {
    Searching {
        search_id: SearchId,
    },
    Completed {
        search_id: SearchId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        salt: Option<U256>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deployer_address: Option<Address>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytecode_hash: Option<B256>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        searched_range: Option<SearchedRange>,
    },
    Error {
        search_id: SearchId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        searched_range: Option<SearchedRange>,
    },
    Timeout {
        search_id: SearchId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        searched_range: Option<SearchedRange>,
    },
}

impl SearchStatus {
    /// Successful match.
    pub fn found(
        search_id: SearchId,
        salt: U256,
        address: Address,
        deployer_address: Address,
        bytecode_hash: B256,
    ) -> Self {
        SearchStatus::Completed {
            search_id,
            success: true,
            salt: Some(salt),
            address: Some(address),
            deployer_address: Some(deployer_address),
            bytecode_hash: Some(bytecode_hash),
            message: None,
            searched_range: None,
        }
    }

    /// The configured space was scanned without a match.
    pub fn no_match(search_id: SearchId, range: SearchedRange) -> Self {
        let message = format!(
            "No matching salt found in range {}-{}",
            range.start_salt, range.end_salt
        );
        SearchStatus::Completed {
            search_id,
            success: false,
            salt: None,
            address: None,
            deployer_address: None,
            bytecode_hash: None,
            message: Some(message),
            searched_range: Some(range),
        }
    }

    pub fn search_id(&self) -> &SearchId {
        match self {
            SearchStatus::Searching { search_id }
            | SearchStatus::Completed { search_id, .. }
            | SearchStatus::Error { search_id, .. }
            | SearchStatus::Timeout { search_id, .. } => search_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SearchStatus::Searching { .. })
    }

    /// Salt and address of a successful search.
    pub fn found_salt(&self) -> Option<(U256, Address)> {
        match self {
            SearchStatus::Completed {
                success: true,
                salt: Some(salt),
                address: Some(address),
                ..
            } => Some((*salt, *address)),
            _ => None,
        }
    }
}
