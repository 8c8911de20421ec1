//! Cryptographic hashing utilities for the vault
//!
//! Provides the SHA-256 / RIPEMD-160 primitives used for transaction
//! digests and for deriving the vault's Base58Check address.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// RIPEMD160(SHA256(data)), the 20-byte "hash160" used in P2SH addresses
pub fn hash160(data: &[u8]) -> Vec<u8> {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().to_vec()
}

/// Base58Check encoding: `base58(version || payload || checksum[..4])`
///
/// The checksum is the first four bytes of the double SHA-256 of
/// `version || payload`.
pub fn base58check(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(1 + payload.len() + 4);
    bytes.push(version);
    bytes.extend_from_slice(payload);

    let checksum = double_sha256(&bytes);
    bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(bytes).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256_hex(b"hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_double_sha256_differs_from_single() {
        assert_ne!(sha256(b"vault"), double_sha256(b"vault"));
        assert_eq!(double_sha256(b"vault").len(), 32);
    }

    #[test]
    fn test_hash160_length() {
        assert_eq!(hash160(b"owners").len(), 20);
    }

    #[test]
    fn test_base58check_p2sh_prefix() {
        // Version 0x05 with a 20-byte payload always encodes to a '3...' string
        let address = base58check(0x05, &hash160(b"2:alice:bob"));
        assert!(address.starts_with('3'));

        let decoded = bs58::decode(&address).into_vec().unwrap();
        assert_eq!(decoded.len(), 25);
        assert_eq!(decoded[0], 0x05);
        assert_eq!(&decoded[21..], &double_sha256(&decoded[..21])[..4]);
    }
}
