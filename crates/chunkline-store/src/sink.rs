use std::sync::Arc;

use chunkline_types::{AccessIdentifiers, ObjectHeader};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::{ObjectSink, ObjectStore, SinkFactory};

/// Sink that buffers one object and writes it to an [`ObjectStore`] on close.
///
/// The store verifies the streamed payload against the header (size and
/// checksums) and assigns the id.
pub struct StoreSink {
    store: Arc<dyn ObjectStore>,
    header: Option<ObjectHeader>,
    payload: Vec<u8>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            header: None,
            payload: Vec::new(),
        }
    }

    /// A factory producing a fresh `StoreSink` over `store` per call.
    pub fn factory(store: Arc<dyn ObjectStore>) -> SinkFactory {
        Box::new(move || Box::new(StoreSink::new(Arc::clone(&store))) as Box<dyn ObjectSink>)
    }
}

impl ObjectSink for StoreSink {
    fn write_header(&mut self, header: ObjectHeader) -> StoreResult<()> {
        if self.header.is_some() {
            return Err(StoreError::HeaderAlreadyWritten);
        }
        self.header = Some(header);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> StoreResult<usize> {
        self.payload.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(self: Box<Self>) -> StoreResult<AccessIdentifiers> {
        let Self {
            store,
            header,
            payload,
        } = *self;
        let header = header.ok_or(StoreError::HeaderMissing)?;
        let object = StoredObject::new(header, payload);
        let id = store.put(&object)?;
        debug!(
            id = %id.short_hex(),
            payload = object.payload.len(),
            header_only = object.is_header_only(),
            "sink closed"
        );
        Ok(AccessIdentifiers::for_header(id, &object.header))
    }
}
