use chunkline_types::{AccessIdentifiers, ObjectHeader, ObjectId};

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Destination for exactly one physical object.
///
/// Contract:
/// - `write_header` is called at most once and always before `close`. It may
///   come before or after the payload bytes: producers that compute checksums
///   while streaming only know the final header once the payload is done.
/// - `write` streams payload bytes in order, zero or more times.
/// - `close` finalizes storage and returns the assigned identifiers. It
///   consumes the sink, so an object can never be closed twice.
///
/// A fresh sink is obtained for every object; implementations are free to
/// route each one to a different backend.
pub trait ObjectSink: Send {
    /// Accept the finalized header of the object.
    fn write_header(&mut self, header: ObjectHeader) -> StoreResult<()>;

    /// Stream payload bytes. Returns the number of bytes consumed.
    fn write(&mut self, data: &[u8]) -> StoreResult<usize>;

    /// Finalize the object and return its identifiers.
    fn close(self: Box<Self>) -> StoreResult<AccessIdentifiers>;
}

/// Zero-argument constructor of fresh sinks, invoked once per object.
pub type SinkFactory = Box<dyn FnMut() -> Box<dyn ObjectSink> + Send>;

/// Keyed object storage.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same object always gets the
///   same id.
/// - `put` verifies the payload against its header before storing.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its id.
    ///
    /// If the object already exists, this is a no-op (idempotent).
    fn put(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    /// Read a full object. Returns `Ok(None)` if it does not exist.
    fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Read only the header of an object.
    ///
    /// Default implementation reads the whole object. Backends that keep
    /// headers separately should override.
    fn head(&self, id: &ObjectId) -> StoreResult<Option<ObjectHeader>> {
        Ok(self.get(id)?.map(|obj| obj.header))
    }

    /// Check whether an object exists.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object by id. Returns `true` if the object existed.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Sorted ids of all stored objects.
    fn ids(&self) -> StoreResult<Vec<ObjectId>>;
}
