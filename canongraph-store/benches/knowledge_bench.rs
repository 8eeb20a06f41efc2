// Vector query and pattern clustering benchmarks
//
// Run with: cargo bench -p canongraph-store --bench knowledge_bench

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use canongraph_store::{
    HashingEmbedder, HnswVectorIndex, MemoryVectorIndex, Node, NodeId, PatternConfig,
    PatternExtractor, VectorConfig, VectorIndex,
};

const DIMENSION: usize = 128;

fn corpus(n: usize) -> Vec<Vec<f32>> {
    let embedder = HashingEmbedder::new(DIMENSION).unwrap_or_default();
    (0..n)
        .map(|i| embedder.embed_text(&format!("sprite {} frame {} palette {}", i % 17, i, i % 5)))
        .collect()
}

fn bench_vector_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_query");

    for size in [256, 2048] {
        let vectors = corpus(size);
        let query = vectors[size / 2].clone();

        let exact = MemoryVectorIndex::new();
        let hnsw = HnswVectorIndex::in_memory(VectorConfig {
            hnsw_min_points: 512,
            ef_construction: 100,
        });
        for vector in &vectors {
            let id = NodeId::new();
            exact.upsert(id, vector.clone(), Utc::now()).unwrap();
            hnsw.upsert(id, vector.clone(), Utc::now()).unwrap();
        }
        // build the graph outside the measured loop
        hnsw.query(&query, 10, 0.0).unwrap();

        group.bench_with_input(BenchmarkId::new("exact", size), &query, |b, q| {
            b.iter(|| exact.query(black_box(q), 10, 0.0).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("hnsw", size), &query, |b, q| {
            b.iter(|| hnsw.query(black_box(q), 10, 0.0).unwrap());
        });
    }

    group.finish();
}

fn bench_pattern_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_extraction");
    let extractor = PatternExtractor::new(PatternConfig::default());

    for size in [100, 1000] {
        let nodes: Vec<Node> = corpus(size)
            .into_iter()
            .enumerate()
            .map(|(i, vector)| {
                Node::builder()
                    .name(format!("asset-{}", i))
                    .asset(format!("assets/{}.png", i), "png", 32, 32)
                    .build()
                    .unwrap()
                    .into_node(vector)
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("greedy", size), &nodes, |b, nodes| {
            b.iter(|| extractor.extract(black_box(nodes), None, None));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vector_query, bench_pattern_extraction);
criterion_main!(benches);
