use camp_criteria::{CriteriaExpander, CriteriaRegistry};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_expand(c: &mut Criterion) {
    let expander = CriteriaExpander::new(CriteriaRegistry::builtin());
    c.bench_function("expand_bivariate_cells", |b| {
        b.iter(|| {
            let batch = expander
                .expand_batch(black_box(&["population_size.Linear1000.C100", "noise.C20"]))
                .expect("expand");
            black_box(batch.cells());
        });
    });
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);
