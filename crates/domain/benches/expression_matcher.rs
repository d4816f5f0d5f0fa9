#![allow(clippy::cast_possible_wrap)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::BTreeMap;

use domain::common::entity::TenantId;
use domain::expression::matcher::{CompiledExpression, matches};
use domain::fact::entity::Event;

fn make_event(i: usize) -> Event {
    Event {
        tenant_id: TenantId("my-organization".to_string()),
        id: format!("IDXYZ-{i:05}"),
        ctime: 1_500 + i as i64,
        text: Some("disk almost full".to_string()),
        context: BTreeMap::from([
            ("category".to_string(), "Server".to_string()),
            ("load".to_string(), format!("{}", i % 20)),
        ]),
        tags: BTreeMap::from([("from".to_string(), "ops@example.com".to_string())]),
        ..Event::default()
    }
}

fn make_expression(clauses: usize) -> String {
    let pool = [
        "tenantId == 'my-organization'",
        "id starts 'IDXYZ'",
        "context.category == 'Server'",
        "tags.from ends '.com'",
        "ctime > 1000",
        "context.load >= 5",
        "eventText contains 'full'",
        "tenantId matches 'my-.*'",
    ];
    pool.iter()
        .cycle()
        .take(clauses)
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}

fn bench_compiled(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_compiled");

    for &n_clauses in &[1, 4, 8] {
        let compiled = CompiledExpression::compile(&make_expression(n_clauses));
        let events: Vec<Event> = (0..64).map(make_event).collect();

        group.bench_with_input(
            BenchmarkId::new("clauses", n_clauses),
            &n_clauses,
            |b, _| {
                b.iter(|| {
                    for e in &events {
                        black_box(compiled.matches(black_box(e)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_uncompiled(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_parse_and_match");
    let expr = make_expression(4);
    let event = make_event(7);

    group.bench_function("4_clauses", |b| {
        b.iter(|| matches(black_box(&expr), black_box(&event)));
    });

    group.bench_function("malformed", |b| {
        b.iter(|| matches(black_box("tenantId == 'broken"), black_box(&event)));
    });

    group.finish();
}

criterion_group!(benches, bench_compiled, bench_uncompiled);
criterion_main!(benches);
