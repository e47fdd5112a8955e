//! HexDigest: a lowercase hex content digest, plus the streaming hasher that produces it.
//!
//! SHA-1 (40 hex chars) is the default for on-disk compatibility with existing
//! hash directories. SHA-256 (64 hex chars) is available for new stores. Both
//! use the same two-level sharding: first two hex chars name the directory,
//! the remainder names the file.

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Digest algorithm used to name stored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Number of hex characters in a digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
        }
    }

    fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            40 => Some(DigestAlgorithm::Sha1),
            64 => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(DigestAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(DigestError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// A validated content digest in lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexDigest(String);

/// Errors that can occur when parsing digests or algorithm names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    #[error("invalid digest length: expected {expected} hex chars, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex character in digest")]
    InvalidHex,

    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),
}

impl HexDigest {
    /// Parse a digest that must have been produced by `algorithm`.
    pub fn parse_for(algorithm: DigestAlgorithm, s: &str) -> Result<Self, DigestError> {
        let expected = algorithm.hex_len();
        if s.len() != expected {
            return Err(DigestError::InvalidLength {
                expected,
                actual: s.len(),
            });
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Hash an in-memory buffer in one go.
    pub fn of_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// The algorithm implied by this digest's length.
    pub fn algorithm(&self) -> DigestAlgorithm {
        // Length was checked at construction.
        DigestAlgorithm::from_hex_len(self.0.len()).unwrap_or_default()
    }

    /// Shard directory name: the first two hex chars.
    pub fn prefix(&self) -> &str {
        &self.0[0..2]
    }

    /// File name within the shard: everything after the prefix.
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts any supported digest length; the algorithm is inferred.
impl FromStr for HexDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match DigestAlgorithm::from_hex_len(s.len()) {
            Some(algorithm) => Self::parse_for(algorithm, s),
            None => Err(DigestError::InvalidLength {
                expected: DigestAlgorithm::default().hex_len(),
                actual: s.len(),
            }),
        }
    }
}

impl TryFrom<String> for HexDigest {
    type Error = DigestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HexDigest> for String {
    fn from(digest: HexDigest) -> Self {
        digest.0
    }
}

impl AsRef<str> for HexDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Incremental hasher fed chunk by chunk while content streams through.
#[derive(Clone)]
pub enum ContentHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha1 => ContentHasher::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha1(h) => h.update(data),
            ContentHasher::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> HexDigest {
        let hex = match self {
            ContentHasher::Sha1(h) => hex::encode(h.finalize()),
            ContentHasher::Sha256(h) => hex::encode(h.finalize()),
        };
        HexDigest(hex)
    }
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentHasher::Sha1(_) => f.write_str("ContentHasher(sha1)"),
            ContentHasher::Sha256(_) => f.write_str("ContentHasher(sha256)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_vectors() {
        let hello = HexDigest::of_bytes(DigestAlgorithm::Sha1, b"hello");
        assert_eq!(hello.as_str(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");

        let empty = HexDigest::of_bytes(DigestAlgorithm::Sha1, b"");
        assert_eq!(empty.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_sha256_known_vector() {
        let hello = HexDigest::of_bytes(DigestAlgorithm::Sha256, b"hello");
        assert_eq!(
            hello.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hello.algorithm(), DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = ContentHasher::new(DigestAlgorithm::Sha1);
        hasher.update(b"hel");
        hasher.update(b"");
        hasher.update(b"lo");
        assert_eq!(
            hasher.finalize(),
            HexDigest::of_bytes(DigestAlgorithm::Sha1, b"hello")
        );
    }

    #[test]
    fn test_prefix_and_remainder() {
        let digest = HexDigest::of_bytes(DigestAlgorithm::Sha1, b"hello");
        assert_eq!(digest.prefix(), "aa");
        assert_eq!(digest.remainder(), "f4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(format!("{}{}", digest.prefix(), digest.remainder()), digest.as_str());
    }

    #[test]
    fn test_parse_normalizes_case() {
        let digest: HexDigest = "AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D".parse().unwrap();
        assert_eq!(digest.as_str(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn test_parse_for_rejects_wrong_length() {
        let sha256 = HexDigest::of_bytes(DigestAlgorithm::Sha256, b"x");
        let result = HexDigest::parse_for(DigestAlgorithm::Sha1, sha256.as_str());
        assert_eq!(
            result,
            Err(DigestError::InvalidLength {
                expected: 40,
                actual: 64
            })
        );
    }

    #[test]
    fn test_parse_rejects_short_and_non_hex() {
        assert!(matches!(
            "abc".parse::<HexDigest>(),
            Err(DigestError::InvalidLength { actual: 3, .. })
        ));
        let bad = "z".repeat(40);
        assert_eq!(bad.parse::<HexDigest>(), Err(DigestError::InvalidHex));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("SHA1".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha1);
        assert_eq!("sha-256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert!(matches!(
            "md5".parse::<DigestAlgorithm>(),
            Err(DigestError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let digest = HexDigest::of_bytes(DigestAlgorithm::Sha1, b"serde");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest));
        let restored: HexDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(digest, restored);

        assert!(serde_json::from_str::<HexDigest>("\"not-a-digest\"").is_err());
    }
}
