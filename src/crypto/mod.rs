//! Cryptographic and encoding utilities
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing
//! - Base58Check encoding for vault addresses
//! - Hex encoding of opaque transaction payloads

pub mod encoding;
pub mod hash;

pub use encoding::{decode_payload, encode_payload};
pub use hash::{base58check, double_sha256, hash160, sha256, sha256_hex};
