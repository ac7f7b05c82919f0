use chunkline_types::ChecksumType;
use sha2::{Digest, Sha256};

use crate::tz::TzHasher;

/// An incremental payload hash.
///
/// Implementations are fed payload bytes in order and can produce their
/// digest at any point without consuming the running state.
pub trait StreamHasher: Send {
    /// The checksum algorithm this hasher computes.
    fn algorithm(&self) -> ChecksumType;

    /// Feed the next slice of payload bytes.
    fn update(&mut self, data: &[u8]);

    /// Digest of everything fed so far.
    fn digest(&self) -> Vec<u8>;

    /// Independent copy of the running state.
    fn box_clone(&self) -> Box<dyn StreamHasher>;
}

/// SHA-256 payload hasher.
#[derive(Clone, Default)]
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamHasher for Sha256Hasher {
    fn algorithm(&self) -> ChecksumType {
        ChecksumType::Sha256
    }

    fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    fn digest(&self) -> Vec<u8> {
        self.inner.clone().finalize().to_vec()
    }

    fn box_clone(&self) -> Box<dyn StreamHasher> {
        Box::new(self.clone())
    }
}

impl StreamHasher for TzHasher {
    fn algorithm(&self) -> ChecksumType {
        ChecksumType::TillichZemor
    }

    fn update(&mut self, data: &[u8]) {
        TzHasher::update(self, data);
    }

    fn digest(&self) -> Vec<u8> {
        TzHasher::digest(self).to_vec()
    }

    fn box_clone(&self) -> Box<dyn StreamHasher> {
        Box::new(self.clone())
    }
}

/// One-shot SHA-256 of a buffer.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Create a fresh hasher for the given algorithm.
pub fn new_hasher(algorithm: ChecksumType) -> Box<dyn StreamHasher> {
    match algorithm {
        ChecksumType::Sha256 => Box::new(Sha256Hasher::new()),
        ChecksumType::TillichZemor => Box::new(TzHasher::new()),
    }
}
