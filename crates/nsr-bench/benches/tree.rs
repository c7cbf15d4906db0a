//! Subject tree benchmarks.
//!
//! Lookup cost by match kind and tree size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nsr_core::SubjectTree;

fn populated(services: usize) -> SubjectTree<usize> {
    let mut tree = SubjectTree::new();
    let mut value = 0;
    for service in 0..services {
        for pattern in [
            format!("svc{}.orders.get", service),
            format!("svc{}.orders.*.items", service),
            format!("svc{}.events.>", service),
        ] {
            tree.add_path(&pattern, value).unwrap();
            value += 1;
        }
    }
    tree
}

/// Benchmark lookups by match kind.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let tree = populated(100);

    let cases = [
        ("literal", "svc50.orders.get"),
        ("single_wildcard", "svc50.orders.o-123.items"),
        ("full_wildcard", "svc50.events.created.eu.west"),
        ("miss", "svc50.unknown.subject"),
    ];
    for (name, subject) in cases {
        group.bench_function(name, |b| b.iter(|| tree.get_value(black_box(subject))));
    }

    group.finish();
}

/// Benchmark literal lookups as the tree grows.
fn bench_lookup_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_scaling");

    for services in [10, 100, 1000] {
        let tree = populated(services);
        let subject = format!("svc{}.orders.o-1.items", services / 2);
        group.bench_with_input(BenchmarkId::from_parameter(services), &subject, |b, s| {
            b.iter(|| tree.get_value(black_box(s)))
        });
    }

    group.finish();
}

/// Benchmark registration.
fn bench_add_path(c: &mut Criterion) {
    c.bench_function("add_path_300", |b| b.iter(|| populated(black_box(100))));
}

criterion_group!(benches, bench_lookup, bench_lookup_scaling, bench_add_path);
criterion_main!(benches);
