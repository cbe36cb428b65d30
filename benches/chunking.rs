use criterion::{Criterion, criterion_group, criterion_main};
use ragkit::chunking::{ChunkingConfig, chunk_text};
use ragkit::vector_store::{StoreEntry, search};
use std::hint::black_box;

fn sample_document() -> String {
    let paragraph = "Retrieval augmented generation pairs a language model with a store of \
        document chunks.\n\nEach chunk is embedded once at index time, and queries are \
        matched by cosine similarity before the answer is generated.  ";
    paragraph.repeat(400)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&document), config.chunk_size, config.overlap));
    });

    let entries: Vec<StoreEntry> = (0..2_000_u64)
        .map(|id| StoreEntry {
            id,
            source: format!("doc{}.md", id % 17),
            text: String::new(),
            embedding: (0..384).map(|d| ((id + d) % 13) as f32 - 6.0).collect(),
        })
        .collect();
    let query: Vec<f32> = (0..384).map(|d| (d % 7) as f32).collect();
    c.bench_function("search", |b| {
        b.iter(|| search(black_box(&entries), black_box(&query), 5));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
