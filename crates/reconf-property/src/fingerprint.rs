//! Shape fingerprints
//!
//! Provides [`Fingerprint`], a 32-byte Blake3 digest used to detect when a
//! property tree or a schema changed shape.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte shape digest (Blake3)
///
/// Two trees with the same leaf names and kinds, in the same order, share a
/// fingerprint regardless of their current values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Digest arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| FingerprintError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Incremental fingerprint computation over a sequence of string tokens
///
/// Tokens are NUL-terminated so `("ab", "c")` and `("a", "bc")` differ.
#[derive(Debug, Clone, Default)]
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
}

impl FingerprintBuilder {
    /// Fresh builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one token
    #[inline]
    pub fn token(&mut self, token: &str) -> &mut Self {
        self.hasher.update(token.as_bytes());
        self.hasher.update(&[0]);
        self
    }

    /// Finish
    #[inline]
    #[must_use]
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(*self.hasher.finalize().as_bytes())
    }
}

/// Fingerprint parse errors
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Not hexadecimal
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Wrong digest length
    #[error("invalid fingerprint length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}
