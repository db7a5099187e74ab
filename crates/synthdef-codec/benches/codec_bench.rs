//! Criterion benchmarks for the binary codec.
//!
//! Encodes and decodes oscillator banks of increasing width, each mixed down
//! and written to a bus.
//!
//! Run with: `cargo bench -p synthdef-codec -- codec/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use synthdef_codec::{decode, encode};
use synthdef_core::{CompileOptions, GE, GraphBuilder, SynthDef, compile_def};
use synthdef_registry::UGenRegistry;

const WIDTHS: &[usize] = &[8, 64, 512];

fn bank(registry: &UGenRegistry, width: usize) -> SynthDef {
    let ugen = |name: &str| registry.get(name).unwrap();
    let mut b = GraphBuilder::new();
    let freqs = GE::consts((0..width).map(|i| 50.0 + i as f32 * 1.5));
    let oscs = b.add(ugen("SinOsc"), [freqs, GE::Const(0.0)]).unwrap();
    let mixed = b.add(ugen("Mix"), [oscs]).unwrap();
    b.add(ugen("Out"), [GE::Const(0.0), mixed]).unwrap();
    compile_def("bank", &b, &CompileOptions::default()).unwrap()
}

fn bench_codec(c: &mut Criterion) {
    let registry = UGenRegistry::new();
    let mut group = c.benchmark_group("codec");

    for &width in WIDTHS {
        let def = bank(&registry, width);
        let bytes = encode(&def).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", width), &def, |bench, def| {
            bench.iter(|| encode(black_box(def)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode", width), &bytes, |bench, bytes| {
            bench.iter(|| decode(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
