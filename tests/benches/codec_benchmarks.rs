//! # Graphwire Codec Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | Graph codec | Encode and decode of flat arrays, linked lists, rings |
//! | Call envelope | Header plus arguments for a typical call |
//! | Correlation table | Register then complete under a single thread |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use graphwire::{
    ArrayValue, CallCodec, CallCorrelationTable, CodecLimits, CorrelationId, FieldDescriptor,
    GraphCodec, MethodSignature, Object, RegistryScope, TypeRegistry, TypeTree, Value,
};

fn codec() -> GraphCodec {
    let types = TypeRegistry::new();
    types.register_composite(
        "Node",
        vec![
            FieldDescriptor::new("value", TypeTree::i32()),
            FieldDescriptor::new("next", TypeTree::new("Node")),
        ],
    );
    GraphCodec::new(Arc::new(types), CodecLimits::default())
}

/// A list of `len` nodes; the last links back to the head when `closed`.
fn list(len: i32, closed: bool) -> Value {
    let head = Object::new("Node").with_field("value", 0).into_ref();
    let mut tail = head.clone();
    for i in 1..len {
        let node = Object::new("Node").with_field("value", i).into_ref();
        tail.set_field("next", node.clone());
        tail = node;
    }
    if closed {
        tail.set_field("next", head.clone());
    }
    Value::Object(head)
}

// ============================================================================
// GRAPH CODEC
// ============================================================================

fn bench_flat_arrays(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph-codec-arrays");
    let codec = codec();
    let ty = TypeTree::array_of(TypeTree::i64());

    for size in [16, 256, 4096] {
        let value = Value::Array(
            ArrayValue::from_vec(TypeTree::i64(), (0..size).map(Value::I64).collect()).into_ref(),
        );
        let bytes = codec.encode_value(&value).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &value, |b, value| {
            b.iter(|| black_box(codec.encode_value(value).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(codec.decode_value(&ty, bytes.clone()).unwrap()))
        });
    }
    group.finish();
}

fn bench_linked_graphs(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph-codec-lists");
    group.measurement_time(Duration::from_secs(5));
    let codec = codec();
    let ty = TypeTree::new("Node");

    for (label, closed) in [("open", false), ("ring", true)] {
        for len in [8, 128] {
            let value = list(len, closed);
            let bytes = codec.encode_value(&value).unwrap();
            let id = format!("{label}-{len}");

            group.bench_with_input(BenchmarkId::new("encode", &id), &value, |b, value| {
                b.iter(|| black_box(codec.encode_value(value).unwrap()))
            });
            group.bench_with_input(BenchmarkId::new("decode", &id), &bytes, |b, bytes| {
                b.iter(|| black_box(codec.decode_value(&ty, bytes.clone()).unwrap()))
            });
        }
    }
    group.finish();
}

// ============================================================================
// CALL ENVELOPE
// ============================================================================

fn bench_call_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("call-envelope");
    let calls = CallCodec::new(codec(), RegistryScope::PerArgument);
    let sig = MethodSignature::new("Store")
        .param(TypeTree::string())
        .param(TypeTree::new("Node"))
        .returns(TypeTree::bool());
    let args = vec![Value::from("key-0001"), list(16, true)];
    let (_, bytes) = calls.encode_call(&sig, &args).unwrap();

    group.bench_function("encode_call", |b| {
        b.iter(|| black_box(calls.encode_call(&sig, &args).unwrap()))
    });
    group.bench_function("decode_call", |b| {
        b.iter(|| {
            let mut reader = calls.reader(bytes.clone());
            let header = calls.read_header(&mut reader).unwrap();
            black_box(calls.read_args(&header.param_types, &mut reader).unwrap())
        })
    });
    group.finish();
}

// ============================================================================
// CORRELATION TABLE
// ============================================================================

fn bench_correlation_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-table");
    let table = CallCorrelationTable::new(Duration::from_secs(30));
    let reply = Bytes::from_static(&[1, 42, 0, 0, 0]);

    group.bench_function("register_complete", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let slot = table.register(id, "Fetch", None);
            table.complete(id, reply.clone());
            black_box(slot.peek())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_flat_arrays,
    bench_linked_graphs,
    bench_call_envelope,
    bench_correlation_table
);
criterion_main!(benches);
