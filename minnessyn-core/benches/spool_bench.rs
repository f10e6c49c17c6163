#[macro_use]
extern crate criterion;

use criterion::Criterion;

use minnessyn_core::arena::{partition, RegionLayout};

#[repr(align(64))]
struct AlignedBuf([u8; 1 << 20]);

fn bench_spool_seal_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("spool_throughput");

    for record_len in [16usize, 64, 256] {
        group.throughput(criterion::Throughput::Bytes(record_len as u64));
        group.bench_function(format!("record_{}", record_len), |b| {
            let layout = RegionLayout::for_budget(64 * 1024);
            let mut buf = Box::new(AlignedBuf([0u8; 1 << 20]));
            let parts = partition(&mut buf.0, &layout).unwrap();
            let payload = vec![0x5au8; record_len];
            let mut seq = 0u64;

            b.iter(|| {
                parts
                    .spool
                    .append(record_len, |out| out.copy_from_slice(&payload))
                    .unwrap();
                seq += 1;
                parts.spool.seal(seq);
                let drained: Result<u64, ()> = parts.spool.drain(|chunk| Ok(chunk.len()));
                drained.unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spool_seal_drain);
criterion_main!(benches);
