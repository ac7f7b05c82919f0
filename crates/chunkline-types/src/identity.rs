use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! hash_identity {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $domain:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Derive an identifier from arbitrary seed material.
            pub fn derive(seed: &[u8]) -> Self {
                let mut hasher = blake3::Hasher::new();
                hasher.update($domain);
                hasher.update(seed);
                Self(*hasher.finalize().as_bytes())
            }

            /// The raw 32 bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Full hex-encoded string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short identifier with a type prefix (first 8 hex characters).
            pub fn short_id(&self) -> String {
                format!("{}{}", $prefix, hex::encode(&self.0[..4]))
            }

            /// Parse from 64 hex characters, with or without the type prefix.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let s = s.strip_prefix($prefix).unwrap_or(s);
                Ok(Self(crate::decode_hex32(s)?))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }
    };
}

hash_identity!(
    /// Container an object belongs to.
    ///
    /// The splitter copies it unchanged from the logical header onto every
    /// chunk, the parent and the linking object.
    ContainerId,
    "cnr:",
    b"chunkline-container-v1:"
);

hash_identity!(
    /// Owner of an object.
    OwnerId,
    "own:",
    b"chunkline-owner-v1:"
);
