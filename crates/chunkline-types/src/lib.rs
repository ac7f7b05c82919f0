//! Foundation types for Chunkline.
//!
//! Identifiers, checksums and the object header record shared by the hashing,
//! storage and splitting crates.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Identifier assigned to a stored physical object
//! - [`ContainerId`] / [`OwnerId`] -- Placement and ownership metadata
//! - [`Checksum`] -- Length-checked SHA-256 or Tillich-Zémor digest
//! - [`ObjectHeader`] -- Metadata of a chunk, parent or linking object
//! - [`AccessIdentifiers`] -- What a sink returns after storing an object

pub mod checksum;
pub mod error;
pub mod header;
pub mod identity;
pub mod object;

pub use checksum::{Checksum, ChecksumType, SHA256_SIZE, TZ_SIZE};
pub use error::TypeError;
pub use header::{AccessIdentifiers, Attribute, ObjectHeader, ParentRef};
pub use identity::{ContainerId, OwnerId};
pub use object::ObjectId;

/// Decode exactly 32 bytes from a hex string.
pub(crate) fn decode_hex32(s: &str) -> Result<[u8; 32], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}
