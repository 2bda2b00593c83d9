//! Benchmarks for the bit buffer and message codec hot paths.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dccl::bitbuffer::BitBuffer;
use dccl::descriptor::{FieldDescriptorBuilder, MessageDescriptorBuilder, WireType};
use dccl::value::MessageValue;
use dccl::{Config, Facade};
use std::hint::black_box;

fn telemetry_facade() -> Facade {
    let mut facade = Facade::new(Config::default());
    facade
        .load(
            MessageDescriptorBuilder::new("Telemetry", 1u32)
                .field(FieldDescriptorBuilder::new("src_id", 1, WireType::Int { min: 0, max: 31 }).in_head().build())
                .field(FieldDescriptorBuilder::new("dest_id", 2, WireType::Int { min: 0, max: 31 }).in_head().build())
                .field(FieldDescriptorBuilder::new("heading", 3, WireType::Float { min: 0.0, max: 359.9, precision: 1 }).build())
                .field(FieldDescriptorBuilder::new("depth", 4, WireType::Int { min: -300, max: 0 }).build())
                .field(
                    FieldDescriptorBuilder::new("samples", 5, WireType::Int { min: 0, max: 4095 })
                        .repeated(16)
                        .build(),
                )
                .build(),
        )
        .expect("benchmark schema should load");
    facade
}

fn telemetry_message() -> MessageValue {
    let mut msg = MessageValue::new("Telemetry");
    msg.set_scalar("src_id", 3i64);
    msg.set_scalar("dest_id", 7i64);
    msg.set_scalar("heading", 271.4f64);
    msg.set_scalar("depth", -42i64);
    msg.set_repeated(
        "samples",
        (0..16).map(|i| dccl::value::WireValue::Int(i * 7 % 4096)).collect(),
    );
    msg
}

fn bench_bitbuffer_push_and_take(c: &mut Criterion) {
    c.bench_function("bitbuffer_push_1000_bits", |b| {
        b.iter(|| {
            let mut buf = BitBuffer::with_capacity(1000);
            for i in 0..125u64 {
                buf.push_bits(black_box(i) & 0xFF, 8);
            }
            black_box(buf)
        });
    });

    c.bench_function("bitbuffer_take_1000_bits", |b| {
        b.iter_batched(
            || {
                let mut buf = BitBuffer::with_capacity(1000);
                for i in 0..125u64 {
                    buf.push_bits(i & 0xFF, 8);
                }
                buf
            },
            |mut buf| {
                while buf.len() >= 8 {
                    black_box(buf.take_bits(8).unwrap());
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_message_round_trip(c: &mut Criterion) {
    let facade = telemetry_facade();
    let msg = telemetry_message();

    let mut group = c.benchmark_group("telemetry_round_trip");
    group.bench_with_input(BenchmarkId::new("encode", "telemetry"), &msg, |b, msg| {
        b.iter(|| black_box(facade.encode(msg).unwrap()));
    });

    let encoded = facade.encode(&msg).unwrap();
    group.bench_with_input(BenchmarkId::new("decode", "telemetry"), &encoded, |b, bytes| {
        b.iter(|| black_box(facade.decode(bytes).unwrap()));
    });
    group.finish();
}

fn bench_size_queries(c: &mut Criterion) {
    let facade = telemetry_facade();
    c.bench_function("telemetry_max_size", |b| {
        b.iter(|| black_box(facade.max_size("Telemetry").unwrap()));
    });
}

criterion_group!(benches, bench_bitbuffer_push_and_take, bench_message_round_trip, bench_size_queries);
criterion_main!(benches);
