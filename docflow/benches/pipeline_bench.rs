//! Benchmarks for engine runs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docflow::prelude::*;
use docflow::modules::FnModule;

fn posts(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            Document::synthetic("bench")
                .with(keys::TITLE, format!("Post {i}"))
                .with(keys::PUBLISHED, format!("2020-01-{:02}", i % 28 + 1))
                .with("tags", vec![format!("tag{}", i % 10), format!("tag{}", i % 7)])
                .with_content("body")
        })
        .collect()
}

fn engine(count: usize) -> Result<Engine, DocflowError> {
    let seed = posts(count);
    EngineBuilder::new()
        .add_pipeline(
            Pipeline::new("Posts")
                .input(FnModule::new("Seed", move |_, _| Ok(seed.clone())))
                .process(OrderDocuments::by_datetime(keys::PUBLISHED).descending()),
        )?
        .add_pipeline(
            Pipeline::new("Tags")
                .with_dependency("Posts")
                .process(ConcatDocuments::dependencies())
                .process(GroupDocuments::new("tags")),
        )?
        .add_pipeline(
            Pipeline::new("Archive")
                .with_dependency("Posts")
                .process(ConcatDocuments::dependencies())
                .process(PaginateDocuments::new(10)?),
        )?
        .build()
}

fn run_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("run");
    for count in [10, 100, 1000] {
        let engine = engine(count).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &engine, |b, engine| {
            b.iter(|| black_box(runtime.block_on(engine.run())));
        });
    }
    group.finish();
}

criterion_group!(benches, run_benchmark);
criterion_main!(benches);
