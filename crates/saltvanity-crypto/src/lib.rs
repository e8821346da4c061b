//! SaltVanity Crypto Primitives
//!
//! Keccak hashing, CREATE2 address derivation and the hex encodings used at
//! the edges of the salt search.

pub mod create2;
pub mod encoding;
pub mod hash;

pub use self::create2::{create2_address, init_code_hash, Create2Preimage};
pub use self::encoding::{eip55_checksum, parse_address, parse_b256, parse_hex, EncodingError};

// Re-export dependencies for use by other crates
pub use alloy_primitives::{Address, B256, U256};
pub use hex;
