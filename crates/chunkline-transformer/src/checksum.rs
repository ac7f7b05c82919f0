use chunkline_crypto::{new_hasher, StreamHasher};
use chunkline_types::{Checksum, ChecksumType, ObjectHeader};

use crate::error::{TransformError, TransformResult};

/// Header field a finalized digest is written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    PayloadChecksum,
    HomomorphicHash,
}

/// One running hash plus the header field its digest belongs in.
pub(crate) struct ChecksumAccumulator {
    hasher: Box<dyn StreamHasher>,
    slot: Slot,
}

impl ChecksumAccumulator {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn fork(&self) -> Self {
        Self {
            hasher: self.hasher.box_clone(),
            slot: self.slot,
        }
    }

    /// Validate the digest length and store the typed checksum in `header`.
    fn finalize_into(self, header: &mut ObjectHeader) -> TransformResult<()> {
        let kind = self.hasher.algorithm();
        let digest = self.hasher.digest();
        let checksum =
            Checksum::new(kind, &digest).map_err(|_| TransformError::ChecksumLength {
                kind,
                expected: kind.size(),
                actual: digest.len(),
            })?;
        match self.slot {
            Slot::PayloadChecksum => header.payload_checksum = Some(checksum),
            Slot::HomomorphicHash => header.payload_homomorphic_hash = Some(checksum),
        }
        Ok(())
    }
}

/// The SHA-256 and Tillich-Zémor accumulators of one object, fed in
/// lock-step.
///
/// Finalizing consumes the pair.
pub(crate) struct PayloadAccumulators {
    checksum: ChecksumAccumulator,
    homomorphic: ChecksumAccumulator,
}

impl PayloadAccumulators {
    pub(crate) fn new() -> Self {
        Self::with_hashers(
            new_hasher(ChecksumType::Sha256),
            new_hasher(ChecksumType::TillichZemor),
        )
    }

    pub(crate) fn with_hashers(
        checksum: Box<dyn StreamHasher>,
        homomorphic: Box<dyn StreamHasher>,
    ) -> Self {
        Self {
            checksum: ChecksumAccumulator {
                hasher: checksum,
                slot: Slot::PayloadChecksum,
            },
            homomorphic: ChecksumAccumulator {
                hasher: homomorphic,
                slot: Slot::HomomorphicHash,
            },
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.checksum.update(data);
        self.homomorphic.update(data);
    }

    /// Independent copy continuing from the current state.
    pub(crate) fn fork(&self) -> Self {
        Self {
            checksum: self.checksum.fork(),
            homomorphic: self.homomorphic.fork(),
        }
    }

    pub(crate) fn finalize_into(self, header: &mut ObjectHeader) -> TransformResult<()> {
        self.checksum.finalize_into(header)?;
        self.homomorphic.finalize_into(header)
    }
}
