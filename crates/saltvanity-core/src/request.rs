//! Search requests

use std::str::FromStr;

use saltvanity_crypto::{parse_address, parse_b256, Address, B256, U256};
use saltvanity_pattern::SuffixPattern;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Salts per batch when the caller does not choose.
pub const DEFAULT_BATCH_SIZE: u64 = 1_000_000;

/// A validated salt search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub target_suffix: SuffixPattern,
    pub deployer_address: Address,
    pub bytecode_hash: B256,
    pub start_salt: U256,
    pub batch_size: u64,
}

impl SearchRequest {
    /// New request starting at salt 0 with the default batch size.
    pub fn new(target_suffix: SuffixPattern, deployer_address: Address, bytecode_hash: B256) -> Self {
        Self {
            target_suffix,
            deployer_address,
            bytecode_hash,
            start_salt: U256::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_start_salt(mut self, start_salt: U256) -> Self {
        self.start_salt = start_salt;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Check invariants the type system does not enforce.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.batch_size == 0 {
            return Err(SearchError::InvalidRequest(
                "batchSize must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Salt as it may arrive over the wire: a JSON number or a decimal / `0x` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaltInput {
    Number(u64),
    Text(String),
}

impl SaltInput {
    pub fn to_salt(&self) -> Result<U256, SearchError> {
        match self {
            SaltInput::Number(n) => Ok(U256::from(*n)),
            SaltInput::Text(s) => U256::from_str(s.trim())
                .map_err(|e| SearchError::InvalidRequest(format!("startSalt: {}", e))),
        }
    }
}

/// Unvalidated request as submitted by an external caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchRequest {
    pub target_suffix: Option<String>,
    pub deployer_address: Option<String>,
    pub bytecode_hash: Option<String>,
    pub start_salt: Option<SaltInput>,
    pub batch_size: Option<u64>,
}

impl TryFrom<RawSearchRequest> for SearchRequest {
    type Error = SearchError;

    fn try_from(raw: RawSearchRequest) -> Result<Self, Self::Error> {
        let suffix = raw
            .target_suffix
            .ok_or_else(|| SearchError::InvalidRequest("targetSuffix is required".to_string()))?;
        let deployer = raw
            .deployer_address
            .ok_or_else(|| SearchError::InvalidRequest("deployerAddress is required".to_string()))?;
        let hash = raw
            .bytecode_hash
            .ok_or_else(|| SearchError::InvalidRequest("bytecodeHash is required".to_string()))?;

        let request = SearchRequest {
            target_suffix: SuffixPattern::new(&suffix)?,
            deployer_address: parse_address(&deployer)?,
            bytecode_hash: parse_b256(&hash)?,
            start_salt: raw.start_salt.map(|s| s.to_salt()).transpose()?.unwrap_or(U256::ZERO),
            batch_size: raw.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        };
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYER: &str = "0x5c46E63Bc046Fe1109fAEaEC1A6089236DF463C7";
    const HASH: &str = "0xfdac7e7671aa51d6411fa89c76f4951e07966e438c23782b4b78408722640925";

    fn raw() -> RawSearchRequest {
        RawSearchRequest {
            target_suffix: Some("B00B5".to_string()),
            deployer_address: Some(DEPLOYER.to_string()),
            bytecode_hash: Some(HASH.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let request = SearchRequest::try_from(raw()).unwrap();
        assert_eq!(request.target_suffix.as_str(), "b00b5");
        assert_eq!(request.start_salt, U256::ZERO);
        assert_eq!(request.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_json_request() {
        let json = format!(
            r#"{{"targetSuffix":"00","deployerAddress":"{}","bytecodeHash":"{}","startSalt":5000,"batchSize":1000}}"#,
            DEPLOYER, HASH
        );
        let raw: RawSearchRequest = serde_json::from_str(&json).unwrap();
        let request = SearchRequest::try_from(raw).unwrap();
        assert_eq!(request.start_salt, U256::from(5000u64));
        assert_eq!(request.batch_size, 1000);

        let hex_salt = RawSearchRequest {
            start_salt: Some(SaltInput::Text("0x10".to_string())),
            ..raw_with_suffix("00")
        };
        assert_eq!(SearchRequest::try_from(hex_salt).unwrap().start_salt, U256::from(16u64));
    }

    fn raw_with_suffix(suffix: &str) -> RawSearchRequest {
        RawSearchRequest {
            target_suffix: Some(suffix.to_string()),
            ..raw()
        }
    }

    #[test]
    fn test_missing_fields_rejected() {
        let no_suffix = RawSearchRequest {
            target_suffix: None,
            ..raw()
        };
        assert!(matches!(
            SearchRequest::try_from(no_suffix),
            Err(SearchError::InvalidRequest(_))
        ));

        let no_hash = RawSearchRequest {
            bytecode_hash: None,
            ..raw()
        };
        assert!(SearchRequest::try_from(no_hash).is_err());
    }

    #[test]
    fn test_malformed_fields_rejected() {
        for bad in [
            raw_with_suffix("xyz"),
            raw_with_suffix(""),
            RawSearchRequest {
                deployer_address: Some("0x1234".to_string()),
                ..raw()
            },
            RawSearchRequest {
                bytecode_hash: Some("not-hex".to_string()),
                ..raw()
            },
            RawSearchRequest {
                batch_size: Some(0),
                ..raw()
            },
            RawSearchRequest {
                start_salt: Some(SaltInput::Text("-1".to_string())),
                ..raw()
            },
        ] {
            assert!(matches!(
                SearchRequest::try_from(bad),
                Err(SearchError::InvalidRequest(_))
            ));
        }
    }
}
