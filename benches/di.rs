#![allow(missing_docs)]

use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use strata_di::{Args, CompositeContainer, ContainerBuilder, Definition};

fn benchmark(c: &mut Criterion) {
    let app = CompositeContainer::builder()
        .with_definition("counter", Definition::value_of(Counter::default))
        .unwrap()
        .with_definition("transient", Definition::new(|_, _, args| {
            let size = args.get::<usize>("size")?.unwrap_or(8);
            Ok(vec![0u8; size])
        }))
        .unwrap()
        .build();

    let module = ContainerBuilder::new()
        .with_parent(app.clone())
        .with_definition("module.counter", Definition::value_of(Counter::default))
        .unwrap()
        .build();
    app.add_child_container(module.clone()).unwrap();

    let args = Args::new().with("size", 64).unwrap();

    c.bench_function("singleton", |b| b.iter(
        || app.get(black_box("counter")).unwrap()
    ));
    c.bench_function("transient", |b| b.iter(
        || app.make_with(black_box("transient"), &args).unwrap()
    ));
    c.bench_function("delegated", |b| b.iter(
        || app.get(black_box("module.counter")).unwrap()
    ));
}

criterion_group!(benches, benchmark);
criterion_main!(benches);

#[derive(Default, Clone, Debug)]
struct Counter;
