//! Hex encoding for opaque transaction payloads
//!
//! Payloads travel as `0x`-prefixed hex strings on the CLI, over the
//! REST API and inside snapshots.

use serde::{Deserialize, Deserializer, Serializer};

/// Encode bytes as a `0x`-prefixed lowercase hex string
pub fn encode_payload(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex payload, with or without the `0x` prefix
///
/// An odd number of digits is left-padded with a zero nibble, so
/// `"0x0"` decodes to `[0x00]` and `"0x123"` to `[0x01, 0x23]`.
pub fn decode_payload(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits))
    } else {
        hex::decode(digits)
    }
}

/// Serde adapter: `#[serde(with = "crate::crypto::encoding::hex_payload")]`
pub mod hex_payload {
    use super::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode_payload(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        decode_payload(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_prefix() {
        assert_eq!(decode_payload("0x0123").unwrap(), vec![0x01, 0x23]);
        assert_eq!(decode_payload("0123").unwrap(), vec![0x01, 0x23]);
    }

    #[test]
    fn test_decode_odd_length() {
        assert_eq!(decode_payload("0x0").unwrap(), vec![0x00]);
        assert_eq!(decode_payload("0x123").unwrap(), vec![0x01, 0x23]);
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_payload("0x").unwrap().is_empty());
        assert_eq!(encode_payload(&[]), "0x");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_payload("0xzz").is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_payload(&[0x01, 0x23]), "0x0123");
    }
}
