use chunkline_types::{ChecksumType, ObjectId};

/// Errors from object sinks and object stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The header declares a different payload length than was streamed.
    #[error("payload size mismatch: header declares {declared} bytes, {actual} were written")]
    PayloadSizeMismatch { declared: u64, actual: u64 },

    /// A payload checksum in the header does not match the streamed bytes.
    #[error("{kind} payload checksum mismatch")]
    ChecksumMismatch { kind: ChecksumType },

    /// The sink consumed fewer bytes than it was given.
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { expected: usize, written: usize },

    /// `write_header` was called more than once on the same sink.
    #[error("object header already written")]
    HeaderAlreadyWritten,

    /// The sink was closed without a header.
    #[error("object header was never written")]
    HeaderMissing,

    /// The backend refused the object.
    #[error("object rejected: {0}")]
    Rejected(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
