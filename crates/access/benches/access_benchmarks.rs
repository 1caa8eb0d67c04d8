use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rentgate_access::{
    AccessRows, GrantRow, GrantStatus, Operation, OwnershipRow, Role, decide, evaluate,
    filter_by_access,
};
use rentgate_core::{GrantId, PropertyId, UserId};

/// A portfolio user: owns `owned`, holds a mix of roles on `granted` more.
fn portfolio(owned: usize, granted: usize) -> (AccessRows, Vec<PropertyId>) {
    let roles = [Role::PropertyManager, Role::LeasingAgent, Role::Viewer];
    let mut ids = Vec::with_capacity(owned + granted);

    let owned_rows: Vec<OwnershipRow> = (0..owned)
        .map(|i| {
            let property_id = PropertyId::new();
            ids.push(property_id);
            OwnershipRow {
                property_id,
                disabled: i % 50 == 0,
            }
        })
        .collect();

    let grant_rows: Vec<GrantRow> = (0..granted)
        .map(|i| {
            let property_id = PropertyId::new();
            ids.push(property_id);
            GrantRow {
                grant_id: GrantId::new(),
                property_id,
                role: roles[i % roles.len()],
                status: GrantStatus::Active,
                property_disabled: false,
            }
        })
        .collect();

    let rows = AccessRows {
        user_id: UserId::new(),
        owned: owned_rows,
        grants: grant_rows,
    };
    (rows, ids)
}

/// Candidate list: half accessible, half foreign.
fn candidates(accessible: &[PropertyId]) -> Vec<PropertyId> {
    accessible
        .iter()
        .copied()
        .chain((0..accessible.len()).map(|_| PropertyId::new()))
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for size in [10usize, 100, 1_000] {
        let (rows, _) = portfolio(size / 2, size / 2);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| evaluate(black_box(rows)));
        });
    }

    group.finish();
}

fn bench_filter_by_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_by_access");

    for size in [10usize, 100, 1_000] {
        let (rows, ids) = portfolio(size / 2, size / 2);
        let input = candidates(&ids);
        group.throughput(Throughput::Elements(input.len() as u64));

        // One evaluation, then O(1) membership per candidate.
        group.bench_with_input(BenchmarkId::new("indexed", size), &input, |b, input| {
            b.iter(|| {
                let index = evaluate(&rows);
                filter_by_access(&index, black_box(input.iter().copied()))
            });
        });

        // Baseline: re-evaluate for each candidate.
        group.bench_with_input(BenchmarkId::new("per_candidate", size), &input, |b, input| {
            b.iter(|| {
                input
                    .iter()
                    .copied()
                    .filter(|p| decide(&evaluate(&rows), *p, Operation::ViewProperty).is_allowed())
                    .count()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_filter_by_access);
criterion_main!(benches);
