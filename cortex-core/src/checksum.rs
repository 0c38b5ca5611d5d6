//! Typed checksum wrapper for attachment integrity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 checksum, stored as raw bytes rather than a bare hex
/// string — matching `layer0::id`'s preference for typed wrappers over
/// primitives wherever the value has a fixed shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl Checksum {
    /// Compute the checksum of a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Hex-encode the checksum.
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::hex_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(de)?;
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(serde::de::Error::custom))
            .collect::<Result<Vec<u8>, D::Error>>()?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("checksum must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let a = Checksum::of(b"hello");
        let b = Checksum::of(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_different_checksum() {
        assert_ne!(Checksum::of(b"hello"), Checksum::of(b"world"));
    }

    #[test]
    fn hex_roundtrip_through_serde() {
        let c = Checksum::of(b"cortex");
        let json = serde_json::to_string(&c).unwrap();
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
