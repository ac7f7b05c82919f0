use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chunkline_store::{ObjectSink, SinkFactory, StoreResult};
use chunkline_types::{AccessIdentifiers, ContainerId, ObjectHeader, ObjectId, OwnerId};
use chunkline_transformer::PayloadSizeLimiter;

const PAYLOAD_SIZE: usize = 1 << 20;
const WRITE_SIZE: usize = 8 * 1024;
const MAX_SIZES: [u64; 3] = [4 * 1024, 64 * 1024, 1 << 20];

/// Discards payload bytes; only the hashing and chunking work is measured.
struct NullSink;

impl ObjectSink for NullSink {
    fn write_header(&mut self, header: ObjectHeader) -> StoreResult<()> {
        black_box(header);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> StoreResult<usize> {
        Ok(data.len())
    }

    fn close(self: Box<Self>) -> StoreResult<AccessIdentifiers> {
        Ok(AccessIdentifiers::new(ObjectId::null()))
    }
}

fn null_factory() -> SinkFactory {
    Box::new(|| Box::new(NullSink) as Box<dyn ObjectSink>)
}

fn bench_split(c: &mut Criterion) {
    let payload: Vec<u8> = (0..PAYLOAD_SIZE).map(|i| (i % 251) as u8).collect();
    let header = ObjectHeader::new(ContainerId::derive(b"bench"), OwnerId::derive(b"bench"));

    let mut group = c.benchmark_group("split");
    group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));
    group.sample_size(10);
    for max in MAX_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(max), &max, |b, &max| {
            b.iter(|| {
                let mut limiter = PayloadSizeLimiter::new(max, null_factory()).unwrap();
                limiter.write_header(header.clone()).unwrap();
                for piece in payload.chunks(WRITE_SIZE) {
                    limiter.write(piece).unwrap();
                }
                black_box(limiter.close().unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_split);
criterion_main!(benches);
