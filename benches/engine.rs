//! Benchmarks for imsgkit decoding, resolution, and assembly.
//!
//! Run with: `cargo bench`
//! Run specific group: `cargo bench --bench engine -- decode`

use std::collections::HashMap;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use imsgkit::decode::decode_attributed_body;
use imsgkit::prelude::*;

// =============================================================================
// Test Data Generators
// =============================================================================

fn generate_typedstream_blob(text_len: usize) -> Vec<u8> {
    let payload = "lorem ipsum ".repeat(text_len / 12 + 1);
    let bytes = &payload.as_bytes()[..text_len.max(1)];
    let mut blob = Vec::new();
    blob.extend_from_slice(&[0x04, 0x0B]);
    blob.extend_from_slice(b"streamtyped");
    blob.extend_from_slice(b"NSString");
    blob.extend_from_slice(&[0x01, 0x94, 0x84, 0x01, 0x2B]);
    if bytes.len() > 127 {
        blob.push(0x81);
        blob.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    } else {
        blob.push(bytes.len() as u8);
    }
    blob.extend_from_slice(bytes);
    blob
}

fn generate_contact_book(count: usize) -> ContactBook {
    let mut book = ContactBook::new();
    for i in 0..count {
        book.push(
            Contact::new(format!("ab:{i}"), format!("Contact {i}"))
                .with_email(format!("contact{i}@example.com"))
                .with_phone(format!("+1555{:07}", i)),
        );
    }
    book
}

fn generate_conversation(count: usize) -> Vec<RawMessageRow> {
    let mut rows = Vec::with_capacity(count);
    for i in 0..count {
        let id = i as i64;
        let row = match i % 5 {
            // Tapback on the previous message
            1 => RawMessageRow::new(id, format!("G-{i}"))
                .with_date_raw(1_000 + id)
                .with_association(format!("G-{}", i - 1), 2000 + (i as i64 % 6)),
            // Text living in attributedBody
            2 => RawMessageRow::new(id, format!("G-{i}"))
                .with_date_raw(1_000 + id)
                .with_attributed_body(generate_typedstream_blob(80)),
            // Legacy text reaction
            3 => RawMessageRow::new(id, format!("G-{i}"))
                .with_date_raw(1_000 + id)
                .with_text(format!("Loved \"message number {}\"", i - 3)),
            _ => RawMessageRow::new(id, format!("G-{i}"))
                .with_date_raw(1_000 + id)
                .with_text(format!("message number {i}"))
                .from_me(i % 2 == 0),
        };
        rows.push(row);
    }
    rows
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for size in [40usize, 400, 4_000] {
        let blob = generate_typedstream_blob(size);
        group.throughput(Throughput::Bytes(blob.len() as u64));
        group.bench_with_input(BenchmarkId::new("typedstream", size), &blob, |b, blob| {
            b.iter(|| decode_attributed_body(black_box(blob)));
        });
    }
    // Garbage goes through every fallback tier.
    let garbage: Vec<u8> = (0..1_000u32).map(|i| (i % 251) as u8).collect();
    group.bench_function("garbage_all_tiers", |b| {
        b.iter(|| decode_attributed_body(black_box(&garbage)));
    });
    group.finish();
}

fn bench_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity");
    for size in [100usize, 1_000] {
        let book = generate_contact_book(size);
        group.bench_with_input(BenchmarkId::new("build", size), &book, |b, book| {
            b.iter(|| IdentityIndex::build(black_box(book)));
        });

        let index = IdentityIndex::build(&book);
        group.bench_with_input(BenchmarkId::new("resolve", size), &index, |b, index| {
            b.iter(|| {
                black_box(index.resolve("(555) 000-0042", None));
                black_box(index.resolve("contact42@example.com", None));
                black_box(index.resolve("+4900000000", None)); // unmapped
            });
        });
    }
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    for size in [100usize, 1_000] {
        let rows = generate_conversation(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("conversation", size), &rows, |b, rows| {
            let attachments = HashMap::new();
            let handles = HashMap::new();
            b.iter(|| {
                MessageAssembler::new().assemble(
                    black_box(rows.clone()),
                    black_box(&attachments),
                    black_box(&handles),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_identity, bench_assemble);
criterion_main!(benches);
