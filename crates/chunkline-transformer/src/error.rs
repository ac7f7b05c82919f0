use std::fmt;

use chunkline_store::StoreError;
use chunkline_types::{ChecksumType, ObjectId};

/// Which step of releasing an object to its sink failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseStep {
    /// `ObjectSink::write_header`
    Header,
    /// `ObjectSink::close`
    Close,
}

impl fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "write header"),
            Self::Close => write!(f, "close sink"),
        }
    }
}

/// Coarse classification of where an error originated.
///
/// Chunks released before a failing phase are already committed to their
/// sinks: a `ParentRelease` or `LinkingRelease` failure means every chunk was
/// stored, a `ChunkWrite`/`ChunkRelease` failure means some were.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Configuration,
    /// Reading the caller's input stream; nothing was split from the failed read.
    InputRead,
    Sequencing,
    ChunkWrite,
    ChunkRelease,
    ParentRelease,
    LinkingRelease,
    Invariant,
    Assembly,
}

/// Errors from splitting or reassembling objects.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("invalid maximum object size {0}: must be greater than zero")]
    InvalidMaxSize(u64),

    #[error("no sink factory configured")]
    MissingSinkFactory,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Methods called out of order. A programming error, never retried.
    #[error("splitter misuse: {0}")]
    Misuse(&'static str),

    #[error("could not read input: {0}")]
    InputRead(#[source] std::io::Error),

    #[error("could not write chunk payload: {0}")]
    ChunkWrite(#[source] StoreError),

    #[error("could not release chunk {index} ({step}): {source}")]
    ChunkRelease {
        index: usize,
        step: ReleaseStep,
        #[source]
        source: StoreError,
    },

    #[error("could not release parent object ({step}): {source}")]
    ParentRelease {
        step: ReleaseStep,
        #[source]
        source: StoreError,
    },

    #[error("could not release linking object ({step}): {source}")]
    LinkingRelease {
        step: ReleaseStep,
        #[source]
        source: StoreError,
    },

    /// A hasher produced a digest of the wrong size: broken hasher wiring.
    #[error("wrong {kind} checksum length: expected {expected}, got {actual}")]
    ChecksumLength {
        kind: ChecksumType,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("broken split-chain at {id}: {reason}")]
    BrokenChain { id: ObjectId, reason: String },

    #[error("{kind} checksum mismatch for object {id}")]
    ChecksumMismatch { id: ObjectId, kind: ChecksumType },

    #[error("payload size mismatch for object {id}: header declares {expected}, chain holds {actual}")]
    SizeMismatch {
        id: ObjectId,
        expected: u64,
        actual: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// The phase that produced this error.
    pub fn phase(&self) -> Phase {
        match self {
            Self::InvalidMaxSize(_) | Self::MissingSinkFactory | Self::Config(_) => {
                Phase::Configuration
            }
            Self::InputRead(_) => Phase::InputRead,
            Self::Misuse(_) => Phase::Sequencing,
            Self::ChunkWrite(_) => Phase::ChunkWrite,
            Self::ChunkRelease { .. } => Phase::ChunkRelease,
            Self::ParentRelease { .. } => Phase::ParentRelease,
            Self::LinkingRelease { .. } => Phase::LinkingRelease,
            Self::ChecksumLength { .. } => Phase::Invariant,
            Self::Store(_)
            | Self::BrokenChain { .. }
            | Self::ChecksumMismatch { .. }
            | Self::SizeMismatch { .. }
            | Self::Io(_) => Phase::Assembly,
        }
    }

    /// Returns `true` for internal invariant violations.
    ///
    /// A fatal error means the splitter's own wiring is broken; the operation
    /// must be abandoned rather than retried with other input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ChecksumLength { .. })
    }
}

/// Result alias for transformer operations.
pub type TransformResult<T> = Result<T, TransformError>;
