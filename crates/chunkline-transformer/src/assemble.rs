use std::io::Write;

use chunkline_crypto::{tz, ContentHasher, Sha256Hasher, StreamHasher};
use chunkline_store::{ObjectStore, StoreError, StoredObject};
use chunkline_types::{ChecksumType, ObjectHeader, ObjectId};
use serde::Serialize;
use tracing::debug;

use crate::error::{TransformError, TransformResult};

/// Outcome of verifying a stored object or split-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainSummary {
    /// The id the chain was resolved from.
    pub id: ObjectId,
    /// Parent object id, `None` for an unsplit object.
    pub parent: Option<ObjectId>,
    /// Chunk ids in payload order.
    pub chunks: Vec<ObjectId>,
    /// Total logical payload size.
    pub payload_size: u64,
    /// Header describing the whole payload.
    pub header: ObjectHeader,
}

impl ChainSummary {
    pub fn is_split(&self) -> bool {
        self.parent.is_some()
    }
}

/// A resolved and verified chain, payloads included.
struct Chain {
    summary: ChainSummary,
    chunks: Vec<StoredObject>,
}

/// Reads split-chains back out of an [`ObjectStore`].
///
/// Accepts the id returned by the splitter (linking object or single
/// object) as well as the id of the last chunk of a chain, which is walked
/// back through the `previous` references.
pub struct ChainReader<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> ChainReader<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Verify links, sizes and checksums without returning the payload.
    pub fn verify(&self, id: &ObjectId) -> TransformResult<ChainSummary> {
        Ok(self.resolve(id)?.summary)
    }

    /// Reassemble the logical payload.
    pub fn assemble(&self, id: &ObjectId) -> TransformResult<Vec<u8>> {
        let mut out = Vec::new();
        self.assemble_into(id, &mut out)?;
        Ok(out)
    }

    /// Verify the chain, then write the logical payload to `out`.
    pub fn assemble_into<W: Write>(&self, id: &ObjectId, mut out: W) -> TransformResult<ChainSummary> {
        let chain = self.resolve(id)?;
        for chunk in &chain.chunks {
            out.write_all(&chunk.payload)?;
        }
        out.flush()?;
        Ok(chain.summary)
    }

    fn resolve(&self, id: &ObjectId) -> TransformResult<Chain> {
        let object = self
            .store
            .get(id)?
            .ok_or(TransformError::Store(StoreError::NotFound(*id)))?;
        let header = &object.header;

        if header.is_linking() {
            let parent_id = header
                .parent
                .as_ref()
                .map(|p| p.id)
                .ok_or_else(|| broken(id, "linking object without parent reference"))?;
            let parent = self
                .store
                .head(&parent_id)?
                .ok_or_else(|| broken(&parent_id, "parent object missing"))?;
            let chunks = header
                .children
                .iter()
                .map(|child| self.load_chunk(child))
                .collect::<TransformResult<Vec<_>>>()?;
            return self.finish_split(*id, parent_id, parent, chunks);
        }

        if let Some(parent_ref) = header.parent.clone() {
            let parent = match parent_ref.header {
                Some(embedded) => *embedded,
                None => self
                    .store
                    .head(&parent_ref.id)?
                    .ok_or_else(|| broken(&parent_ref.id, "parent object missing"))?,
            };
            let chunks = self.walk_back(*id, object)?;
            return self.finish_split(*id, parent_ref.id, parent, chunks);
        }

        if header.previous.is_some() {
            return Err(broken(id, "not the last chunk of its split-chain"));
        }
        if object.is_header_only() {
            return Err(broken(
                id,
                "header-only parent object; resolve it through its linking object",
            ));
        }

        object.verify_payload()?;
        let summary = ChainSummary {
            id: *id,
            parent: None,
            chunks: vec![*id],
            payload_size: object.header.payload_size,
            header: object.header.clone(),
        };
        debug!(id = %id.short_hex(), size = summary.payload_size, "single object verified");
        Ok(Chain {
            summary,
            chunks: vec![object],
        })
    }

    fn load_chunk(&self, id: &ObjectId) -> TransformResult<(ObjectId, StoredObject)> {
        let object = self
            .store
            .get(id)?
            .ok_or_else(|| broken(id, "chunk missing"))?;
        Ok((*id, object))
    }

    /// Collect the chain ending at `last`, first chunk first.
    fn walk_back(
        &self,
        last_id: ObjectId,
        last: StoredObject,
    ) -> TransformResult<Vec<(ObjectId, StoredObject)>> {
        let mut chunks = vec![(last_id, last)];
        while let Some(previous) = chunks.last().and_then(|(_, c)| c.header.previous) {
            chunks.push(self.load_chunk(&previous)?);
        }
        chunks.reverse();
        Ok(chunks)
    }

    fn finish_split(
        &self,
        id: ObjectId,
        parent_id: ObjectId,
        parent: ObjectHeader,
        chunks: Vec<(ObjectId, StoredObject)>,
    ) -> TransformResult<Chain> {
        let parent_matches = ContentHasher::OBJECT
            .verify_json(&parent, &parent_id)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if !parent_matches {
            return Err(broken(&parent_id, "parent header does not hash to its id"));
        }
        let payload_size = check_chain(&parent_id, &parent, &chunks)?;
        debug!(
            id = %id.short_hex(),
            parent = %parent_id.short_hex(),
            chunks = chunks.len(),
            size = payload_size,
            "split-chain verified"
        );
        let (ids, objects): (Vec<_>, Vec<_>) = chunks.into_iter().unzip();
        Ok(Chain {
            summary: ChainSummary {
                id,
                parent: Some(parent_id),
                chunks: ids,
                payload_size,
                header: parent,
            },
            chunks: objects,
        })
    }
}

/// Check the chunk links and the parent's size and checksums. Returns the
/// total payload size.
fn check_chain(
    parent_id: &ObjectId,
    parent: &ObjectHeader,
    chunks: &[(ObjectId, StoredObject)],
) -> TransformResult<u64> {
    let Some((last_id, last)) = chunks.last() else {
        return Err(broken(parent_id, "split-chain without chunks"));
    };
    if last.header.parent.as_ref().map(|p| p.id) != Some(*parent_id) {
        return Err(broken(last_id, "last chunk does not reference the parent"));
    }

    let mut expected_previous = None;
    let mut total = 0u64;
    let mut sha = Sha256Hasher::new();
    let mut parts = Vec::with_capacity(chunks.len());
    for (id, chunk) in chunks {
        if chunk.header.previous != expected_previous {
            return Err(broken(id, "previous reference does not match chain order"));
        }
        if chunk.is_header_only() {
            return Err(broken(id, "chunk carries no payload"));
        }
        chunk.verify_payload()?;
        let tz_part = chunk
            .header
            .payload_homomorphic_hash
            .as_ref()
            .ok_or(TransformError::ChecksumMismatch {
                id: *id,
                kind: ChecksumType::TillichZemor,
            })?;
        parts.push(tz_part.as_bytes());
        sha.update(&chunk.payload);
        total += chunk.payload.len() as u64;
        expected_previous = Some(*id);
    }

    if total != parent.payload_size {
        return Err(TransformError::SizeMismatch {
            id: *parent_id,
            expected: parent.payload_size,
            actual: total,
        });
    }

    let sha_matches = parent
        .payload_checksum
        .as_ref()
        .is_some_and(|cs| cs.as_bytes() == sha.digest().as_slice());
    if !sha_matches {
        return Err(TransformError::ChecksumMismatch {
            id: *parent_id,
            kind: ChecksumType::Sha256,
        });
    }

    let tz_matches = match &parent.payload_homomorphic_hash {
        Some(cs) => tz::validate(cs.as_bytes(), &parts).unwrap_or(false),
        None => false,
    };
    if !tz_matches {
        return Err(TransformError::ChecksumMismatch {
            id: *parent_id,
            kind: ChecksumType::TillichZemor,
        });
    }
    Ok(total)
}

fn broken(id: &ObjectId, reason: &str) -> TransformError {
    TransformError::BrokenChain {
        id: *id,
        reason: reason.to_string(),
    }
}

/// Reassemble the payload addressed by `id`.
pub fn assemble(store: &dyn ObjectStore, id: &ObjectId) -> TransformResult<Vec<u8>> {
    ChainReader::new(store).assemble(id)
}

/// Verify the object or split-chain addressed by `id`.
pub fn verify_chain(store: &dyn ObjectStore, id: &ObjectId) -> TransformResult<ChainSummary> {
    ChainReader::new(store).verify(id)
}
