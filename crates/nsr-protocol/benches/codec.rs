//! Codec benchmarks for nsr-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nsr_protocol::{codec, Frame, Headers};

fn sample_request(size: usize) -> Frame {
    let mut headers = Headers::new();
    headers.append("trace-id", "3f1c0f1e");
    Frame::request(1, "orders.eu.created", headers, vec![0u8; size])
}

fn bench_encode_small(c: &mut Criterion) {
    let frame = sample_request(64);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("request_64B", |b| b.iter(|| codec::encode(black_box(&frame))));
    group.finish();
}

fn bench_decode_small(c: &mut Criterion) {
    let encoded = codec::encode(&sample_request(64)).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("request_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

criterion_group!(benches, bench_encode_small, bench_decode_small);
criterion_main!(benches);
