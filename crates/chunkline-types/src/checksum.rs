use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Size of a SHA-256 payload checksum in bytes.
pub const SHA256_SIZE: usize = 32;

/// Size of a Tillich-Zémor homomorphic checksum in bytes.
pub const TZ_SIZE: usize = 64;

/// Algorithm a [`Checksum`] was produced with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumType {
    /// Standard SHA-256 digest.
    Sha256,
    /// Tillich-Zémor homomorphic digest.
    TillichZemor,
}

impl ChecksumType {
    /// Fixed digest length for this algorithm.
    pub const fn size(self) -> usize {
        match self {
            Self::Sha256 => SHA256_SIZE,
            Self::TillichZemor => TZ_SIZE,
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::TillichZemor => write!(f, "tz"),
        }
    }
}

/// A typed, length-checked digest.
///
/// Construction rejects digests whose length does not match
/// [`ChecksumType::size`], so a stored `Checksum` always has the fixed size of
/// its algorithm.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawChecksum")]
pub struct Checksum {
    kind: ChecksumType,
    #[serde(with = "hex_bytes")]
    value: Vec<u8>,
}

impl Checksum {
    /// Build a checksum, validating the digest length.
    pub fn new(kind: ChecksumType, value: &[u8]) -> Result<Self, TypeError> {
        if value.len() != kind.size() {
            return Err(TypeError::InvalidLength {
                expected: kind.size(),
                actual: value.len(),
            });
        }
        Ok(Self {
            kind,
            value: value.to_vec(),
        })
    }

    /// SHA-256 checksum from a fixed-size digest.
    pub fn sha256(digest: [u8; SHA256_SIZE]) -> Self {
        Self {
            kind: ChecksumType::Sha256,
            value: digest.to_vec(),
        }
    }

    /// Tillich-Zémor checksum from a fixed-size digest.
    pub fn tillich_zemor(digest: [u8; TZ_SIZE]) -> Self {
        Self {
            kind: ChecksumType::TillichZemor,
            value: digest.to_vec(),
        }
    }

    pub fn kind(&self) -> ChecksumType {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.value)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({}:{})", self.kind, hex::encode(&self.value[..4]))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.to_hex())
    }
}

#[derive(Deserialize)]
struct RawChecksum {
    kind: ChecksumType,
    #[serde(with = "hex_bytes")]
    value: Vec<u8>,
}

impl TryFrom<RawChecksum> for Checksum {
    type Error = TypeError;

    fn try_from(raw: RawChecksum) -> Result<Self, Self::Error> {
        Self::new(raw.kind, &raw.value)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
