use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chunkline_crypto::ContentHasher;
use chunkline_types::{ObjectHeader, ObjectId};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

const HEADER_EXT: &str = "json";
const PAYLOAD_EXT: &str = "payload";

/// Directory-backed object store.
///
/// On-disk layout, one pair of files per object:
/// ```text
/// <root>/<hex id>.json     header, pretty-printed JSON
/// <root>/<hex id>.payload  raw payload bytes
/// ```
/// Both files are written to a temporary file and renamed into place, the
/// payload first, so a visible header always has its payload next to it.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path(&self, id: &ObjectId, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{ext}", id.to_hex()))
    }

    fn write_atomic(&self, target: &Path, data: &[u8]) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Read and decode a header file, checking that it still hashes to `id`.
    fn read_header(&self, id: &ObjectId) -> StoreResult<Option<ObjectHeader>> {
        let raw = match fs::read(self.path(id, HEADER_EXT)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let header: ObjectHeader =
            serde_json::from_slice(&raw).map_err(|e| StoreError::CorruptObject {
                id: *id,
                reason: format!("undecodable header: {e}"),
            })?;
        let matches = ContentHasher::OBJECT
            .verify_json(&header, id)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if !matches {
            warn!(id = %id.short_hex(), "stored header does not hash to its id");
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: "header hash mismatch".into(),
            });
        }
        Ok(Some(header))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        object.verify_payload()?;
        let id = object.compute_id()?;
        let header_path = self.path(&id, HEADER_EXT);
        if header_path.exists() {
            return Ok(id);
        }
        let header = serde_json::to_vec_pretty(&object.header)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_atomic(&self.path(&id, PAYLOAD_EXT), &object.payload)?;
        self.write_atomic(&header_path, &header)?;
        debug!(id = %id.short_hex(), size = object.payload.len(), root = %self.root.display(), "stored object");
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let Some(header) = self.read_header(id)? else {
            return Ok(None);
        };
        let payload = match fs::read(self.path(id, PAYLOAD_EXT)) {
            Ok(payload) => payload,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::CorruptObject {
                    id: *id,
                    reason: "payload file missing".into(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let object = StoredObject::new(header, payload);
        object
            .verify_payload()
            .map_err(|e| StoreError::CorruptObject {
                id: *id,
                reason: e.to_string(),
            })?;
        Ok(Some(object))
    }

    fn head(&self, id: &ObjectId) -> StoreResult<Option<ObjectHeader>> {
        self.read_header(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.path(id, HEADER_EXT).exists())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let existed = match fs::remove_file(self.path(id, HEADER_EXT)) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(self.path(id, PAYLOAD_EXT)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(existed)
    }

    fn ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HEADER_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match ObjectId::from_hex(stem) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping foreign file in store"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for FsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsObjectStore")
            .field("root", &self.root)
            .finish()
    }
}
