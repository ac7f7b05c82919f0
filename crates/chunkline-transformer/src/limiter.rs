use std::io::Read;

use chunkline_store::{ObjectSink, SinkFactory, StoreError};
use chunkline_types::{AccessIdentifiers, ObjectHeader, ObjectId, ParentRef};
use tracing::debug;

use crate::checksum::PayloadAccumulators;
use crate::config::SplitterConfig;
use crate::error::{Phase, ReleaseStep, TransformError, TransformResult};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// The chunk currently receiving payload bytes.
struct OpenChunk {
    header: ObjectHeader,
    accumulators: PayloadAccumulators,
    sink: Box<dyn ObjectSink>,
    size: u64,
}

/// Header and whole-payload accumulators of the logical object.
///
/// Only tracked once the payload spills into a second chunk.
struct ParentState {
    header: ObjectHeader,
    accumulators: PayloadAccumulators,
}

/// Streaming splitter bounding every emitted object to `max_size` payload
/// bytes.
///
/// Call order: [`write_header`](Self::write_header) once,
/// [`write`](Self::write) any number of times, then [`close`](Self::close).
/// Every physical object goes to a fresh sink from the factory.
///
/// With more than one chunk, `close` additionally emits a header-only parent
/// object describing the whole payload and a linking object listing the
/// chunks in order. Chunks form a chain through their `previous` ids and the
/// last chunk embeds the parent header.
///
/// A failed write or release leaves chunks already committed to their sinks
/// and loses the one in flight; the splitter refuses any further `write` or
/// `close` after that.
pub struct PayloadSizeLimiter {
    max_size: u64,
    written: u64,
    sink_factory: SinkFactory,
    template: Option<ObjectHeader>,
    current: Option<OpenChunk>,
    parent: Option<ParentState>,
    chunk_ids: Vec<ObjectId>,
    failed: Option<Phase>,
}

impl std::fmt::Debug for PayloadSizeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSizeLimiter")
            .field("max_size", &self.max_size)
            .field("written", &self.written)
            .field("chunks_released", &self.chunk_ids.len())
            .field("split", &self.parent.is_some())
            .field("failed", &self.failed)
            .finish()
    }
}

/// Builder for [`PayloadSizeLimiter`].
#[derive(Default)]
pub struct LimiterBuilder {
    config: SplitterConfig,
    sink_factory: Option<SinkFactory>,
}

impl LimiterBuilder {
    pub fn config(mut self, config: SplitterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_object_size(mut self, max_object_size: u64) -> Self {
        self.config.max_object_size = max_object_size;
        self
    }

    pub fn sink_factory(mut self, factory: SinkFactory) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    pub fn build(self) -> TransformResult<PayloadSizeLimiter> {
        let factory = self
            .sink_factory
            .ok_or(TransformError::MissingSinkFactory)?;
        PayloadSizeLimiter::new(self.config.max_object_size, factory)
    }
}

impl PayloadSizeLimiter {
    pub fn new(max_size: u64, sink_factory: SinkFactory) -> TransformResult<Self> {
        if max_size == 0 {
            return Err(TransformError::InvalidMaxSize(max_size));
        }
        Ok(Self {
            max_size,
            written: 0,
            sink_factory,
            template: None,
            current: None,
            parent: None,
            chunk_ids: Vec::new(),
            failed: None,
        })
    }

    pub fn from_config(config: &SplitterConfig, sink_factory: SinkFactory) -> TransformResult<Self> {
        config.validate()?;
        Self::new(config.max_object_size, sink_factory)
    }

    pub fn builder() -> LimiterBuilder {
        LimiterBuilder::default()
    }

    /// Maximum payload bytes per emitted object.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Total payload bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Ids of the chunks released so far, in order.
    pub fn chunk_ids(&self) -> &[ObjectId] {
        &self.chunk_ids
    }

    /// Phase of the write that broke this splitter, if any.
    pub fn failed_phase(&self) -> Option<Phase> {
        self.failed
    }

    fn ensure_usable(&self) -> TransformResult<()> {
        match self.failed {
            Some(_) => Err(TransformError::Misuse("splitter used after a failed write")),
            None => Ok(()),
        }
    }

    /// Record the logical object's metadata.
    ///
    /// Only container, owner and attributes are kept; checksums, size and
    /// split fields are computed by the splitter.
    pub fn write_header(&mut self, header: ObjectHeader) -> TransformResult<()> {
        if self.template.is_some() {
            return Err(TransformError::Misuse("header already written"));
        }
        self.template = Some(header.template());
        Ok(())
    }

    /// Stream payload bytes, cutting chunks at every `max_size` boundary.
    ///
    /// On success all of `data` was consumed.
    pub fn write(&mut self, data: &[u8]) -> TransformResult<usize> {
        if self.template.is_none() {
            return Err(TransformError::Misuse("write before write_header"));
        }
        self.ensure_usable()?;
        if let Err(e) = self.write_chunks(data) {
            self.failed = Some(e.phase());
            return Err(e);
        }
        Ok(data.len())
    }

    fn write_chunks(&mut self, data: &[u8]) -> TransformResult<()> {
        if self.current.is_none() {
            self.open_chunk()?;
        }

        let mut rest = data;
        while !rest.is_empty() {
            if self.at_boundary() {
                self.cross_boundary()?;
            }
            let room = self.max_size - self.written % self.max_size;
            let cut = rest.len().min(usize::try_from(room).unwrap_or(usize::MAX));
            let (head, tail) = rest.split_at(cut);
            self.fan_out(head)?;
            rest = tail;
        }
        Ok(())
    }

    /// Drain `reader` through [`write`](Self::write). Returns the bytes read.
    pub fn write_from<R: Read>(&mut self, mut reader: R) -> TransformResult<u64> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransformError::InputRead(e)),
            };
            self.write(&buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Release the remaining objects and return the identifiers of the
    /// object that addresses the whole payload.
    ///
    /// That is the single chunk when nothing was split, otherwise the linking
    /// object (whose `parent_id` names the parent object). Closing without any
    /// payload emits one empty chunk.
    pub fn close(mut self) -> TransformResult<AccessIdentifiers> {
        if self.template.is_none() {
            return Err(TransformError::Misuse("close before write_header"));
        }
        self.ensure_usable()?;
        if self.current.is_none() {
            self.open_chunk()?;
        }
        let last = self
            .current
            .take()
            .ok_or(TransformError::Misuse("no open chunk at close"))?;

        match self.parent.take() {
            None => self.release_chunk(last, None),
            Some(parent) => {
                let (parent_id, parent_header) = self.release_parent(parent)?;
                self.release_chunk(last, Some(ParentRef::with_header(parent_id, parent_header)))?;
                self.release_linking(parent_id)
            }
        }
    }

    fn at_boundary(&self) -> bool {
        self.current
            .as_ref()
            .map_or(true, |chunk| chunk.size == self.max_size)
    }

    /// Release the full current chunk and open the next one.
    fn cross_boundary(&mut self) -> TransformResult<()> {
        let full = self
            .current
            .take()
            .ok_or(TransformError::Misuse("no open chunk at boundary"))?;
        if self.parent.is_none() {
            // The parent sees every byte: start it from the first chunk's state.
            self.parent = Some(ParentState {
                header: full.header.template(),
                accumulators: full.accumulators.fork(),
            });
        }
        self.release_chunk(full, None)?;
        self.open_chunk()
    }

    fn open_chunk(&mut self) -> TransformResult<()> {
        let template = self
            .template
            .as_ref()
            .ok_or(TransformError::Misuse("payload before write_header"))?;
        let mut header = template.template();
        header.previous = self.chunk_ids.last().copied();
        debug!(
            index = self.chunk_ids.len(),
            offset = self.written,
            "opening chunk"
        );
        self.current = Some(OpenChunk {
            header,
            accumulators: PayloadAccumulators::new(),
            sink: (self.sink_factory)(),
            size: 0,
        });
        Ok(())
    }

    /// Send `data` to the current sink and every live accumulator.
    fn fan_out(&mut self, data: &[u8]) -> TransformResult<()> {
        let chunk = self
            .current
            .as_mut()
            .ok_or(TransformError::Misuse("no open chunk"))?;
        let n = chunk.sink.write(data).map_err(TransformError::ChunkWrite)?;
        if n != data.len() {
            return Err(TransformError::ChunkWrite(StoreError::ShortWrite {
                expected: data.len(),
                written: n,
            }));
        }
        chunk.accumulators.update(data);
        if let Some(parent) = self.parent.as_mut() {
            parent.accumulators.update(data);
        }
        chunk.size += data.len() as u64;
        self.written += data.len() as u64;
        Ok(())
    }

    fn release_chunk(
        &mut self,
        chunk: OpenChunk,
        parent: Option<ParentRef>,
    ) -> TransformResult<AccessIdentifiers> {
        let index = self.chunk_ids.len();
        let OpenChunk {
            mut header,
            accumulators,
            mut sink,
            size,
        } = chunk;
        header.payload_size = size;
        accumulators.finalize_into(&mut header)?;
        header.parent = parent;

        sink.write_header(header)
            .map_err(|source| TransformError::ChunkRelease {
                index,
                step: ReleaseStep::Header,
                source,
            })?;
        let ids = sink.close().map_err(|source| TransformError::ChunkRelease {
            index,
            step: ReleaseStep::Close,
            source,
        })?;

        debug!(index, id = %ids.self_id.short_hex(), size, "chunk released");
        self.chunk_ids.push(ids.self_id);
        Ok(ids)
    }

    /// Emit the header-only parent object and return its id and header.
    fn release_parent(&mut self, parent: ParentState) -> TransformResult<(ObjectId, ObjectHeader)> {
        let ParentState {
            mut header,
            accumulators,
        } = parent;
        header.payload_size = self.written;
        header.payload_detached = true;
        accumulators.finalize_into(&mut header)?;

        let mut sink = (self.sink_factory)();
        sink.write_header(header.clone())
            .map_err(|source| TransformError::ParentRelease {
                step: ReleaseStep::Header,
                source,
            })?;
        let ids = sink.close().map_err(|source| TransformError::ParentRelease {
            step: ReleaseStep::Close,
            source,
        })?;

        debug!(id = %ids.self_id.short_hex(), size = self.written, "parent released");
        Ok((ids.self_id, header))
    }

    fn release_linking(&mut self, parent_id: ObjectId) -> TransformResult<AccessIdentifiers> {
        let template = self
            .template
            .as_ref()
            .ok_or(TransformError::Misuse("linking object without header"))?;
        let mut header = template.template();
        header.children = self.chunk_ids.clone();
        header.parent = Some(ParentRef::id(parent_id));
        PayloadAccumulators::new().finalize_into(&mut header)?;

        let mut sink = (self.sink_factory)();
        sink.write_header(header)
            .map_err(|source| TransformError::LinkingRelease {
                step: ReleaseStep::Header,
                source,
            })?;
        let ids = sink.close().map_err(|source| TransformError::LinkingRelease {
            step: ReleaseStep::Close,
            source,
        })?;

        debug!(
            id = %ids.self_id.short_hex(),
            children = self.chunk_ids.len(),
            "linking object released"
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkline_crypto::{sha256, tz, tz_hash};
    use chunkline_store::{StoreResult, StoredObject};
    use chunkline_types::{ContainerId, OwnerId};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    /// Everything a recording sink saw, in emission order.
    type Log = Arc<Mutex<Vec<StoredObject>>>;

    struct RecordingSink {
        log: Log,
        header: Option<ObjectHeader>,
        payload: Vec<u8>,
    }

    impl ObjectSink for RecordingSink {
        fn write_header(&mut self, header: ObjectHeader) -> StoreResult<()> {
            assert!(self.header.is_none(), "header written twice");
            self.header = Some(header);
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> StoreResult<usize> {
            self.payload.extend_from_slice(data);
            Ok(data.len())
        }

        fn close(self: Box<Self>) -> StoreResult<AccessIdentifiers> {
            let object = StoredObject::new(self.header.expect("header"), self.payload);
            let id = object.compute_id()?;
            let ids = AccessIdentifiers::for_header(id, &object.header);
            self.log.lock().unwrap().push(object);
            Ok(ids)
        }
    }

    fn recording_factory(log: &Log) -> SinkFactory {
        let log = Arc::clone(log);
        Box::new(move || {
            Box::new(RecordingSink {
                log: Arc::clone(&log),
                header: None,
                payload: Vec::new(),
            }) as Box<dyn ObjectSink>
        })
    }

    /// Sink failing at a given step for the `fail_at`-th object created.
    struct FailingSink {
        fail: Option<ReleaseStep>,
        fail_write: bool,
    }

    impl ObjectSink for FailingSink {
        fn write_header(&mut self, _header: ObjectHeader) -> StoreResult<()> {
            match self.fail {
                Some(ReleaseStep::Header) => Err(StoreError::Rejected("header".into())),
                _ => Ok(()),
            }
        }

        fn write(&mut self, data: &[u8]) -> StoreResult<usize> {
            if self.fail_write {
                return Err(StoreError::Rejected("write".into()));
            }
            Ok(data.len())
        }

        fn close(self: Box<Self>) -> StoreResult<AccessIdentifiers> {
            match self.fail {
                Some(ReleaseStep::Close) => Err(StoreError::Rejected("close".into())),
                _ => Ok(AccessIdentifiers::new(ObjectId::from_bytes(b"ok"))),
            }
        }
    }

    fn failing_factory(fail_at: usize, step: ReleaseStep) -> SinkFactory {
        let mut created = 0usize;
        Box::new(move || {
            let fail = (created == fail_at).then_some(step);
            created += 1;
            Box::new(FailingSink {
                fail,
                fail_write: false,
            }) as Box<dyn ObjectSink>
        })
    }

    fn logical_header() -> ObjectHeader {
        ObjectHeader::new(ContainerId::derive(b"bucket"), OwnerId::derive(b"alice"))
            .with_attribute("FileName", "big.bin")
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn split(max: u64, data: &[u8], step: usize) -> (AccessIdentifiers, Vec<StoredObject>) {
        let log = Log::default();
        let mut limiter = PayloadSizeLimiter::new(max, recording_factory(&log)).unwrap();
        limiter.write_header(logical_header()).unwrap();
        for piece in data.chunks(step.max(1)) {
            assert_eq!(limiter.write(piece).unwrap(), piece.len());
        }
        let ids = limiter.close().unwrap();
        let objects = log.lock().unwrap().clone();
        (ids, objects)
    }

    fn chunks_of(objects: &[StoredObject]) -> Vec<&StoredObject> {
        objects
            .iter()
            .filter(|o| !o.header.is_linking() && !o.is_header_only())
            .collect()
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let log = Log::default();
        assert!(matches!(
            PayloadSizeLimiter::new(0, recording_factory(&log)),
            Err(TransformError::InvalidMaxSize(0))
        ));
    }

    #[test]
    fn builder_requires_sink_factory() {
        let err = PayloadSizeLimiter::builder()
            .max_object_size(10)
            .build()
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingSinkFactory));

        let log = Log::default();
        let limiter = PayloadSizeLimiter::builder()
            .config(SplitterConfig::with_max_object_size(10))
            .sink_factory(recording_factory(&log))
            .build()
            .unwrap();
        assert_eq!(limiter.max_size(), 10);
    }

    #[test]
    fn small_payload_is_single_plain_object() {
        let data = payload(40);
        let (ids, objects) = split(100, &data, 40);

        assert_eq!(objects.len(), 1);
        let only = &objects[0];
        assert_eq!(only.payload, data);
        assert_eq!(only.header.payload_size, 40);
        assert!(!only.header.is_split_member());
        assert_eq!(only.header.attribute("FileName"), Some("big.bin"));
        assert_eq!(ids.self_id, only.compute_id().unwrap());
        assert!(ids.parent_id.is_none());
    }

    #[test]
    fn empty_payload_emits_one_empty_chunk() {
        let (ids, objects) = split(100, &[], 1);
        assert_eq!(objects.len(), 1);
        let only = &objects[0];
        assert!(only.payload.is_empty());
        assert_eq!(only.header.payload_size, 0);
        assert_eq!(
            only.header.payload_checksum.as_ref().unwrap().as_bytes(),
            sha256(b"").as_slice()
        );
        assert_eq!(ids.self_id, only.compute_id().unwrap());
    }

    #[test]
    fn uneven_split_emits_chain_parent_and_linking() {
        let data = payload(250);
        let (ids, objects) = split(100, &data, 250);

        // c0, c1, parent, c2, linking
        assert_eq!(objects.len(), 5);
        let (c0, c1, parent, c2, linking) =
            (&objects[0], &objects[1], &objects[2], &objects[3], &objects[4]);
        let c0_id = c0.compute_id().unwrap();
        let c1_id = c1.compute_id().unwrap();
        let parent_id = parent.compute_id().unwrap();
        let c2_id = c2.compute_id().unwrap();

        assert_eq!(c0.payload, &data[..100]);
        assert_eq!(c1.payload, &data[100..200]);
        assert_eq!(c2.payload, &data[200..]);
        assert_eq!(c0.header.previous, None);
        assert_eq!(c1.header.previous, Some(c0_id));
        assert_eq!(c2.header.previous, Some(c1_id));
        assert!(c0.header.parent.is_none());
        assert!(c1.header.parent.is_none());

        assert!(parent.is_header_only());
        assert!(parent.header.payload_detached);
        assert!(!c0.header.payload_detached && !c2.header.payload_detached);
        assert!(!linking.header.payload_detached);
        assert_eq!(parent.header.payload_size, 250);
        assert!(parent.header.previous.is_none());

        let embedded = c2.header.parent.as_ref().unwrap();
        assert_eq!(embedded.id, parent_id);
        assert_eq!(embedded.header.as_deref(), Some(&parent.header));

        assert_eq!(linking.header.children, vec![c0_id, c1_id, c2_id]);
        assert_eq!(linking.header.parent, Some(ParentRef::id(parent_id)));
        assert_eq!(linking.header.payload_size, 0);
        assert!(linking.payload.is_empty());
        assert_eq!(linking.header.attribute("FileName"), Some("big.bin"));

        assert_eq!(ids.self_id, linking.compute_id().unwrap());
        assert_eq!(ids.parent_id, Some(parent_id));
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let data = payload(200);
        let (_, objects) = split(100, &data, 100);

        // c0, parent, c1, linking
        assert_eq!(objects.len(), 4);
        let chunks = chunks_of(&objects);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.payload.len() == 100));
        assert_eq!(objects[3].header.children.len(), 2);
    }

    #[test]
    fn empty_write_on_boundary_is_noop() {
        let log = Log::default();
        let mut limiter = PayloadSizeLimiter::new(4, recording_factory(&log)).unwrap();
        limiter.write_header(logical_header()).unwrap();
        limiter.write(b"abcd").unwrap();
        limiter.write(b"").unwrap();
        limiter.close().unwrap();

        let objects = log.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].payload, b"abcd");
    }

    #[test]
    fn one_byte_chunks() {
        let (ids, objects) = split(1, b"ab", 2);
        let chunks = chunks_of(&objects);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].payload, b"a");
        assert_eq!(chunks[1].payload, b"b");

        let linking = objects.last().unwrap();
        assert_eq!(ids.self_id, linking.compute_id().unwrap());
        let parent = objects.iter().find(|o| o.is_header_only()).unwrap();
        assert_eq!(parent.header.payload_size, 2);
    }

    #[test]
    fn parent_checksums_cover_whole_payload() {
        let data = payload(1000);
        let (_, objects) = split(128, &data, 77);
        let parent = objects.iter().find(|o| o.is_header_only()).unwrap();

        assert_eq!(
            parent.header.payload_checksum.as_ref().unwrap().as_bytes(),
            sha256(&data).as_slice()
        );
        let whole_tz = tz_hash(&data);
        assert_eq!(
            parent.header.payload_homomorphic_hash.as_ref().unwrap().as_bytes(),
            whole_tz.as_slice()
        );

        let chunk_tz: Vec<&[u8]> = chunks_of(&objects)
            .iter()
            .map(|c| c.header.payload_homomorphic_hash.as_ref().unwrap().as_bytes())
            .collect();
        assert!(tz::validate(&whole_tz, &chunk_tz).unwrap());
    }

    #[test]
    fn write_from_reader_matches_direct_writes() {
        let data = payload(300);
        let (direct, _) = split(64, &data, 300);

        let log = Log::default();
        let mut limiter = PayloadSizeLimiter::new(64, recording_factory(&log)).unwrap();
        limiter.write_header(logical_header()).unwrap();
        assert_eq!(limiter.write_from(&data[..]).unwrap(), 300);
        assert_eq!(limiter.written(), 300);
        assert_eq!(limiter.close().unwrap(), direct);
    }

    #[test]
    fn misuse_is_reported() {
        let log = Log::default();
        let mut limiter = PayloadSizeLimiter::new(10, recording_factory(&log)).unwrap();
        let err = limiter.write(b"x").unwrap_err();
        assert_eq!(err.phase(), Phase::Sequencing);

        limiter.write_header(logical_header()).unwrap();
        assert!(matches!(
            limiter.write_header(logical_header()),
            Err(TransformError::Misuse(_))
        ));

        let fresh = PayloadSizeLimiter::new(10, recording_factory(&log)).unwrap();
        assert!(matches!(fresh.close(), Err(TransformError::Misuse(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn chunk_write_failure() {
        let factory: SinkFactory = Box::new(|| {
            Box::new(FailingSink {
                fail: None,
                fail_write: true,
            }) as Box<dyn ObjectSink>
        });
        let mut limiter = PayloadSizeLimiter::new(10, factory).unwrap();
        limiter.write_header(logical_header()).unwrap();
        let err = limiter.write(b"abc").unwrap_err();
        assert_eq!(err.phase(), Phase::ChunkWrite);
    }

    #[test]
    fn release_failures_name_their_phase() {
        // 25 bytes at M=10: sinks are created for c0, c1, c2, parent, linking.
        let cases = [
            (0, ReleaseStep::Close, Phase::ChunkRelease),
            (1, ReleaseStep::Header, Phase::ChunkRelease),
            (2, ReleaseStep::Close, Phase::ChunkRelease),
            (3, ReleaseStep::Header, Phase::ParentRelease),
            (4, ReleaseStep::Close, Phase::LinkingRelease),
        ];
        for (fail_at, step, phase) in cases {
            let mut limiter = PayloadSizeLimiter::new(10, failing_factory(fail_at, step)).unwrap();
            limiter.write_header(logical_header()).unwrap();
            let result = limiter.write(&payload(25)).and_then(|_| limiter.close());
            let err = result.unwrap_err();
            assert_eq!(err.phase(), phase, "sink {fail_at}");
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn close_after_failed_release_is_rejected() {
        let mut limiter = PayloadSizeLimiter::new(10, failing_factory(1, ReleaseStep::Close)).unwrap();
        limiter.write_header(logical_header()).unwrap();
        let err = limiter.write(&payload(25)).unwrap_err();
        assert_eq!(err.phase(), Phase::ChunkRelease);
        assert_eq!(limiter.failed_phase(), Some(Phase::ChunkRelease));

        assert!(matches!(limiter.write(b"x"), Err(TransformError::Misuse(_))));
        assert!(matches!(limiter.close(), Err(TransformError::Misuse(_))));
    }

    #[test]
    fn failed_chunk_write_emits_no_parent_or_linking() {
        let log = Log::default();
        let mut recorded = recording_factory(&log);
        let mut created = 0usize;
        // c0 records normally, c1 rejects its payload.
        let factory: SinkFactory = Box::new(move || {
            created += 1;
            if created == 2 {
                Box::new(FailingSink {
                    fail: None,
                    fail_write: true,
                }) as Box<dyn ObjectSink>
            } else {
                recorded()
            }
        });
        let mut limiter = PayloadSizeLimiter::new(10, factory).unwrap();
        limiter.write_header(logical_header()).unwrap();
        assert_eq!(limiter.write(&payload(25)).unwrap_err().phase(), Phase::ChunkWrite);
        assert!(matches!(limiter.close(), Err(TransformError::Misuse(_))));

        let objects = log.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects.iter().all(|o| !o.is_header_only() && !o.header.is_linking()));
    }

    struct BrokenReader {
        good: &'static [u8],
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.good.is_empty() {
                return Err(std::io::Error::other("device unplugged"));
            }
            let n = self.good.len().min(buf.len());
            buf[..n].copy_from_slice(&self.good[..n]);
            self.good = &self.good[n..];
            Ok(n)
        }
    }

    #[test]
    fn input_read_failure_has_its_own_phase() {
        let log = Log::default();
        let mut limiter = PayloadSizeLimiter::new(4, recording_factory(&log)).unwrap();
        limiter.write_header(logical_header()).unwrap();
        let err = limiter
            .write_from(BrokenReader { good: b"abcdef" })
            .unwrap_err();
        assert!(matches!(err, TransformError::InputRead(_)));
        assert_eq!(err.phase(), Phase::InputRead);

        // Bytes read before the failure were split cleanly; the caller may finish.
        assert_eq!(limiter.failed_phase(), None);
        assert_eq!(limiter.written(), 6);
        limiter.write(b"gh").unwrap();
        assert!(limiter.close().unwrap().parent_id.is_some());
    }

    proptest! {
        #[test]
        fn output_is_independent_of_write_granularity(
            len in 0usize..600,
            max in 1u64..200,
            step in 1usize..97,
        ) {
            let data = payload(len);
            let (whole_ids, whole) = split(max, &data, len.max(1));
            let (piece_ids, pieces) = split(max, &data, step);
            prop_assert_eq!(whole_ids, piece_ids);
            prop_assert_eq!(whole, pieces);
        }

        #[test]
        fn chunk_count_and_sizes(len in 0usize..600, max in 1u64..200) {
            let data = payload(len);
            let (_, objects) = split(max, &data, 53);
            let chunks = chunks_of(&objects);

            let m = max as usize;
            let expected = if len == 0 { 1 } else { len.div_ceil(m) };
            prop_assert_eq!(chunks.len(), expected);
            for (i, chunk) in chunks.iter().enumerate() {
                let want = if i + 1 < expected { m } else { len - m * (expected - 1) };
                prop_assert_eq!(chunk.payload.len(), want);
            }

            let joined: Vec<u8> = chunks.iter().flat_map(|c| c.payload.clone()).collect();
            prop_assert_eq!(joined, data);
            let split_extras = objects.len() - chunks.len();
            prop_assert_eq!(split_extras, if expected > 1 { 2 } else { 0 });
        }
    }
}
