//! CREATE2 address derivation (EIP-1014).
//!
//!   address = keccak256(0xff ++ deployer ++ salt ++ bytecode_hash)[12..32]
//!
//! The salt is always the full 32-byte big-endian encoding of the integer,
//! left-padded with zeros.

use alloy_primitives::{Address, B256, U256};

use crate::hash::keccak256;

/// Length of the CREATE2 preimage: 0xff (1) + deployer (20) + salt (32) + hash (32).
pub const PREIMAGE_LEN: usize = 85;

const SALT_OFFSET: usize = 21;
const HASH_OFFSET: usize = 53;

/// Derive the CREATE2 deployment address for one salt.
pub fn create2_address(deployer: &Address, salt: &U256, bytecode_hash: &B256) -> Address {
    Create2Preimage::new(deployer, bytecode_hash).address_for(salt)
}

/// Keccak-256 of contract init code, the `bytecode_hash` CREATE2 expects.
pub fn init_code_hash(init_code: &[u8]) -> B256 {
    B256::from(keccak256(init_code))
}

/// Pre-filled CREATE2 preimage.
///
/// The prefix byte, deployer and bytecode hash are fixed for a whole search,
/// so the hot loop only rewrites the 32 salt bytes before hashing.
#[derive(Debug, Clone)]
pub struct Create2Preimage {
    buf: [u8; PREIMAGE_LEN],
}

impl Create2Preimage {
    pub fn new(deployer: &Address, bytecode_hash: &B256) -> Self {
        let mut buf = [0u8; PREIMAGE_LEN];
        buf[0] = 0xff;
        buf[1..SALT_OFFSET].copy_from_slice(deployer.as_slice());
        buf[HASH_OFFSET..].copy_from_slice(bytecode_hash.as_slice());
        Self { buf }
    }

    /// Address for `salt`, reusing the preimage buffer.
    #[inline]
    pub fn address_for(&mut self, salt: &U256) -> Address {
        self.buf[SALT_OFFSET..HASH_OFFSET].copy_from_slice(&salt.to_be_bytes::<32>());
        let hash = keccak256(&self.buf);
        Address::from_slice(&hash[12..32])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::str::FromStr;

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    // Examples from EIP-1014
    #[test]
    fn test_eip1014_zero_deployer_zero_salt() {
        let hash = init_code_hash(&[0x00]);
        let derived = create2_address(&Address::ZERO, &U256::ZERO, &hash);
        assert_eq!(derived, addr("0x4D1A2e2bB4F88F0250f26Ffff098B0b30B26BF38"));
    }

    #[test]
    fn test_eip1014_deadbeef_deployer() {
        let hash = init_code_hash(&[0x00]);
        let deployer = addr("0xdeadbeef00000000000000000000000000000000");
        let derived = create2_address(&deployer, &U256::ZERO, &hash);
        assert_eq!(derived, addr("0xB928f69Bb1D91Cd65274e3c79d8986362984fDA3"));
    }

    #[test]
    fn test_eip1014_padded_salt() {
        // Salt 0xcafebabe must be left-padded to 32 bytes before hashing.
        let hash = init_code_hash(&hex::decode("deadbeef").unwrap());
        let deployer = addr("0x00000000000000000000000000000000deadbeef");
        let derived = create2_address(&deployer, &U256::from(0xcafebabe_u64), &hash);
        assert_eq!(derived, addr("0x60f3f640a8508fC6a86d45DF051962668E1e8AC7"));
    }

    #[test]
    fn test_deterministic() {
        let deployer = addr("0x5c46E63Bc046Fe1109fAEaEC1A6089236DF463C7");
        let hash = B256::repeat_byte(0x11);
        let salt = U256::from(123_456_789u64);
        assert_eq!(
            create2_address(&deployer, &salt, &hash),
            create2_address(&deployer, &salt, &hash)
        );
    }

    #[test]
    fn test_known_search_vector() {
        let deployer = addr("0x5c46E63Bc046Fe1109fAEaEC1A6089236DF463C7");
        let hash = B256::from_str("0xfdac7e7671aa51d6411fa89c76f4951e07966e438c23782b4b78408722640925").unwrap();
        assert_eq!(
            create2_address(&deployer, &U256::ZERO, &hash),
            addr("0xe022817dfc3ff44fb97f81b47f0c9cc0c645b378")
        );
        assert_eq!(
            create2_address(&deployer, &U256::from(222u64), &hash),
            addr("0x5b48ab5aea84075b19a642624fa8ba9fb2e52500")
        );
    }

    #[test]
    fn test_matches_alloy_reference() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let deployer = Address::from(rng.gen::<[u8; 20]>());
            let hash = B256::from(rng.gen::<[u8; 32]>());
            let salt = U256::from_be_bytes(rng.gen::<[u8; 32]>());

            let expected = deployer.create2(salt.to_be_bytes::<32>(), hash);
            assert_eq!(create2_address(&deployer, &salt, &hash), expected);
        }
    }

    #[test]
    fn test_preimage_reuse() {
        let deployer = addr("0xdeadbeef00000000000000000000000000000000");
        let hash = init_code_hash(&[0x00]);
        let mut preimage = Create2Preimage::new(&deployer, &hash);

        for n in [0u64, 1, 255, 256, u64::MAX] {
            let salt = U256::from(n);
            assert_eq!(preimage.address_for(&salt), create2_address(&deployer, &salt, &hash));
        }
        assert_eq!(
            preimage.address_for(&U256::MAX),
            create2_address(&deployer, &U256::MAX, &hash)
        );
    }
}
