//! Object sinks and object storage for Chunkline.
//!
//! A producer hands each physical object to an [`ObjectSink`]: header,
//! payload bytes, close. The sinks provided here land objects in an
//! [`ObjectStore`], which keys them by an id derived from the header.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- one header file and one payload file per object
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; the id is derived from the header,
//!    which carries the payload checksums.
//! 2. Stores verify payload size and checksums before accepting an object.
//! 3. Header-only objects (split-chain parents) are accepted with an empty
//!    payload.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod sink;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::StoredObject;
pub use sink::StoreSink;
pub use traits::{ObjectSink, ObjectStore, SinkFactory};
