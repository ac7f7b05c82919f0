use chunkline_crypto::{sha256, tz_hash, ContentHasher};
use chunkline_types::{ChecksumType, ObjectHeader, ObjectId};

use crate::error::{StoreError, StoreResult};

/// A stored object: finalized header plus payload bytes.
///
/// Header-only objects (a split-chain parent) are marked
/// `payload_detached`: their size and checksums describe bytes that live in
/// other objects, and they carry no payload of their own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub header: ObjectHeader,
    pub payload: Vec<u8>,
}

impl StoredObject {
    pub fn new(header: ObjectHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Compute the object's identifier.
    ///
    /// The id is a domain-separated BLAKE3 hash of the canonical JSON header.
    /// The header carries the payload checksums, so the id binds the payload
    /// as well.
    pub fn compute_id(&self) -> StoreResult<ObjectId> {
        ContentHasher::OBJECT
            .hash_json(&self.header)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Returns `true` if the header describes bytes not held by this object.
    pub fn is_header_only(&self) -> bool {
        self.header.payload_detached
    }

    /// Check the payload against the header's size and checksums.
    ///
    /// Header-only objects must carry no payload bytes; their checksums are
    /// checked against the chunks instead.
    pub fn verify_payload(&self) -> StoreResult<()> {
        if self.is_header_only() {
            if !self.payload.is_empty() {
                return Err(StoreError::Rejected(format!(
                    "header-only object carries {} payload bytes",
                    self.payload.len()
                )));
            }
            return Ok(());
        }
        let actual = self.payload.len() as u64;
        if actual != self.header.payload_size {
            return Err(StoreError::PayloadSizeMismatch {
                declared: self.header.payload_size,
                actual,
            });
        }
        if let Some(cs) = &self.header.payload_checksum {
            if cs.as_bytes() != sha256(&self.payload).as_slice() {
                return Err(StoreError::ChecksumMismatch {
                    kind: ChecksumType::Sha256,
                });
            }
        }
        if let Some(cs) = &self.header.payload_homomorphic_hash {
            if cs.as_bytes() != tz_hash(&self.payload).as_slice() {
                return Err(StoreError::ChecksumMismatch {
                    kind: ChecksumType::TillichZemor,
                });
            }
        }
        Ok(())
    }
}
