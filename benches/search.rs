use course_vectors::store::{
    DirectoryResolver, NewVectorRecord, RecordPayload, SimilaritySearchEngine, VectorRecordStore,
    cosine_similarity,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tempfile::TempDir;

const DIMENSION: usize = 768;
const CHUNKS_PER_DOCUMENT: usize = 50;

fn vector(seed: usize) -> Vec<f32> {
    (0..DIMENSION)
        .map(|j| ((seed * 31 + j * 17) % 97) as f32 / 97.0 - 0.5)
        .collect()
}

fn populate(resolver: &DirectoryResolver, documents: usize) {
    let store = VectorRecordStore::new(resolver.clone());
    for doc in 0..documents {
        let document_id = format!("doc{}", doc);
        let records = (0..CHUNKS_PER_DOCUMENT)
            .map(|chunk| NewVectorRecord {
                id: None,
                vector: vector(doc * CHUNKS_PER_DOCUMENT + chunk),
                payload: RecordPayload::new(
                    "bench",
                    document_id.as_str(),
                    chunk as u32,
                    "lorem ipsum dolor sit amet",
                ),
            })
            .collect();
        store
            .store(records, "bench", &document_id, "Bench_Course")
            .expect("can store bench records");
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let a = vector(1);
    let b = vector(2);
    c.bench_function("cosine_similarity", |bench| {
        bench.iter(|| cosine_similarity(black_box(&a), black_box(&b)));
    });

    let mut group = c.benchmark_group("course_search");
    group.sample_size(20);
    for documents in [1, 10, 40] {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let resolver = DirectoryResolver::new(temp_dir.path());
        populate(&resolver, documents);
        let engine = SimilaritySearchEngine::new(resolver);
        let query = vector(7);

        group.bench_with_input(
            BenchmarkId::from_parameter(documents * CHUNKS_PER_DOCUMENT),
            &query,
            |bench, query| {
                bench.iter(|| engine.search(black_box(query), "bench", 10, 0.0));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
