//! Benchmarks for the packet wire codec and log resynchronization
//!
//! Measures:
//! - Version 3 encoding of a typical instrument packet
//! - Decoding a clean log from memory
//! - Recovering from garbage between packets
//!
//! Platform: Cross-platform (in-memory data, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ssds_packets::TrackingKeys;
use ssds_packets::codec::{Decoded, decode, encode};
use ssds_packets::io::{ByteSource, MemorySource};
use ssds_packets::log::{ResyncOutcome, Resynchronizer};
use ssds_packets::test_utils::sample_packet;
use std::hint::black_box;

fn bench_encode(c: &mut Criterion) {
    let mut packet = sample_packet(101, 100, 10);
    packet.primary = vec![0x5A; 4096];
    let len = encode(&packet).expect("encode").len();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(len as u64));
    group.bench_function("v3_4k_primary", |b| b.iter(|| black_box(encode(black_box(&packet)))));
    group.finish();
}

fn bench_decode_log(c: &mut Criterion) {
    let log: Vec<u8> = (10..1010)
        .flat_map(|seq| encode(&sample_packet(101, 100, seq)).expect("encode"))
        .collect();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(log.len() as u64));
    group.bench_function("clean_log_1000_packets", |b| {
        b.iter(|| {
            let mut source = MemorySource::new(log.as_slice());
            let mut packets = 0;
            while !source.remaining().is_empty() {
                if let Ok(Decoded::Packet(packet)) = decode(&mut source) {
                    black_box(packet);
                    packets += 1;
                }
            }
            packets
        })
    });
    group.finish();
}

fn bench_resync(c: &mut Criterion) {
    let mut bytes = vec![0xEE; 1024];
    bytes.extend_from_slice(&encode(&sample_packet(101, 100, 10)).expect("encode"));
    let resync = Resynchronizer::new(TrackingKeys::from_basename("101_16_7_100"));

    c.bench_function("resync_after_1k_garbage", |b| {
        b.iter(|| {
            let mut source = MemorySource::new(bytes.as_slice());
            let tag = source.read_i32().expect("tag");
            match resync.recover(&mut source, tag) {
                ResyncOutcome::Recovered(packet) => black_box(packet.sequence_number),
                ResyncOutcome::Exhausted(reason) => panic!("resync failed: {reason:?}"),
            }
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode_log, bench_resync);
criterion_main!(benches);
