//! Throughput benchmarks for chunk boundary scanning.
//!
//! Measures how fast combined inputs are split back into chunks with
//! marker framing and with length-prefixed framing.
//!
//! Run with:
//! ```bash
//! cargo bench --bench scanner
//! ```

#![allow(clippy::expect_used)]

use bigcompressor::{CHUNK_SEPARATOR, ChunkSource, LengthPrefixedReader, MarkerScanner};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const MAX_BUFFER: usize = 64 * 1024 * 1024;

/// Pseudo-random chunk bodies that never contain the separator
fn chunk_bodies(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut seed = 0x9E37_79B9_7F4A_7C15u64;
    (0..count)
        .map(|_| {
            (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    // Keep bytes above '_' so the separator cannot form.
                    0x60 | (seed as u8 & 0x1F)
                })
                .collect()
        })
        .collect()
}

fn marker_input(bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for body in bodies {
        out.extend_from_slice(body);
        out.extend_from_slice(CHUNK_SEPARATOR);
    }
    out
}

fn length_prefixed_input(bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for body in bodies {
        out.extend_from_slice(&(body.len() as u64).to_le_bytes());
        out.extend_from_slice(body);
    }
    out
}

fn drain(source: &mut dyn ChunkSource) -> usize {
    let mut buf = Vec::new();
    let mut count = 0;
    while source.next_chunk(&mut buf).expect("scan failed").is_some() {
        count += 1;
    }
    count
}

fn bench_scanners(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for chunk_len in [4 * 1024, 256 * 1024, 4 * 1024 * 1024] {
        let bodies = chunk_bodies(8, chunk_len);
        let marker = marker_input(&bodies);
        let prefixed = length_prefixed_input(&bodies);
        group.throughput(Throughput::Bytes(marker.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("marker", chunk_len),
            &marker,
            |b, input| {
                b.iter(|| {
                    let mut scanner = MarkerScanner::new(input.as_slice(), MAX_BUFFER);
                    black_box(drain(&mut scanner))
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("length_prefixed", chunk_len),
            &prefixed,
            |b, input| {
                b.iter(|| {
                    let mut reader = LengthPrefixedReader::new(input.as_slice(), MAX_BUFFER);
                    black_box(drain(&mut reader))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_scanners);
criterion_main!(benches);
