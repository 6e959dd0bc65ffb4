use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Length of a hex-encoded sha256 content digest.
pub const HASH_HEX_LEN: usize = 64;

/// Content hash of a document, stored as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentHash(String);

impl DocumentHash {
    pub fn parse(value: &str) -> Result<Self, DocumentError> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized.len() != HASH_HEX_LEN || hex::decode(&normalized).is_err() {
            return Err(DocumentError::InvalidHash(value.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Hash of a raw sha256 digest.
    pub fn from_bytes(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading `len` characters, used as the abbreviated lookup key.
    pub fn prefix(&self, len: usize) -> &str {
        // Hex digits are ASCII, so any byte index is a char boundary.
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for DocumentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentHash {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentHash {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentHash> for String {
    fn from(hash: DocumentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for DocumentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocumentHash {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "5d4b2d8e5c4b2f7d9f0a6b3c1e2d4f6a8b0c2e4f6a8b0c2d4e6f8a0b2c4d6e8f";

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let upper = format!("  {}  ", SAMPLE.to_ascii_uppercase());
        let hash = DocumentHash::parse(&upper).expect("valid hash");
        assert_eq!(hash.as_str(), SAMPLE);
    }

    #[test]
    fn parse_rejects_short_and_non_hex() {
        assert!(DocumentHash::parse("abc").is_err());
        let bad = format!("{}zz", &SAMPLE[..62]);
        assert!(matches!(
            DocumentHash::parse(&bad),
            Err(DocumentError::InvalidHash(_))
        ));
    }

    #[test]
    fn prefix_clamps_to_length() {
        let hash = DocumentHash::parse(SAMPLE).expect("valid hash");
        assert_eq!(hash.prefix(5), "5d4b2");
        assert_eq!(hash.prefix(500), SAMPLE);
    }

    #[test]
    fn serde_uses_plain_string() {
        let hash = DocumentHash::parse(SAMPLE).expect("valid hash");
        let encoded = serde_json::to_string(&hash).expect("encode");
        assert_eq!(encoded, format!("\"{SAMPLE}\""));
        assert!(serde_json::from_str::<DocumentHash>("\"nope\"").is_err());
    }
}
