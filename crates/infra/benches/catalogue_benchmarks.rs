use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::collections::{BTreeSet, HashSet};

use storefront_catalogue::{ProductId, Slug};
use storefront_core::TenantId;
use storefront_infra::event_store::InMemoryEventStore;
use storefront_infra::CatalogueService;

fn bench_slug_collisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("slug_unique_from");

    for taken in [0usize, 10, 100] {
        let mut existing = HashSet::new();
        existing.insert("gift-cards".to_string());
        for n in 2..=taken + 1 {
            existing.insert(format!("gift-cards-{n}"));
        }

        group.bench_with_input(BenchmarkId::from_parameter(taken), &existing, |b, existing| {
            b.iter(|| {
                Slug::unique_from(black_box("Gift Cards"), |candidate| {
                    existing.contains(candidate.as_str())
                })
            })
        });
    }
    group.finish();
}

fn bench_create_product_class(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_product_class");
    group.throughput(Throughput::Elements(1));

    group.bench_function("distinct_names", |b| {
        let svc = CatalogueService::in_memory(InMemoryEventStore::new());
        let tenant_id = TenantId::new();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            svc.create_product_class(tenant_id, &format!("Class {n}"), None, None, BTreeSet::new())
        })
    });

    group.bench_function("same_name", |b| {
        let svc = CatalogueService::in_memory(InMemoryEventStore::new());
        let tenant_id = TenantId::new();
        b.iter(|| svc.create_product_class(tenant_id, "Books", None, None, BTreeSet::new()))
    });
    group.finish();
}

fn bench_recommendations_for(c: &mut Criterion) {
    let mut group = c.benchmark_group("recommendations_for");

    for count in [10u16, 100, 1000] {
        let svc = CatalogueService::in_memory(InMemoryEventStore::new());
        let tenant_id = TenantId::new();
        let primary = ProductId::new();
        for ranking in 0..count {
            let _ = svc.recommend(tenant_id, primary, ProductId::new(), Some(ranking));
        }

        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| svc.recommendations_for(black_box(tenant_id), black_box(primary)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_slug_collisions,
    bench_create_product_class,
    bench_recommendations_for
);
criterion_main!(benches);
