use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use undetermini_core::{CallTag, Cost, CostLedger, ImplementationFactory, Method, MethodValue};
use undetermini_core::{ExecutionError, hash_value};

fn bench_hashing(c: &mut Criterion) {
    let small = json!({"firstname": "Nicolas", "lastname": "Rotier", "age": 32});
    c.bench_function("hash_small_object", |b| b.iter(|| hash_value(black_box(&small))));

    let nested = json!({
        "candidate": {
            "name": {"first": "Nicolas", "last": "Rotier"},
            "skills": ["rust", "typescript", "sql"],
            "history": (0..50).map(|i| json!({"year": 1990 + i, "role": "engineer"})).collect::<Vec<_>>(),
        }
    });
    c.bench_function("hash_nested_object", |b| b.iter(|| hash_value(black_box(&nested))));
}

fn bench_cost_ledger(c: &mut Criterion) {
    let ledger = CostLedger::new();
    c.bench_function("ledger_open_add_take", |b| {
        b.iter(|| {
            let tag = CallTag::generate();
            ledger.open(&tag);
            for _ in 0..10 {
                ledger.add(&tag, Cost::from_f64(0.00015));
            }
            black_box(ledger.take(&tag))
        })
    });

    let costs: Vec<Cost> = (0..1000).map(|i| Cost::from_scaled(i * 1_000)).collect();
    c.bench_function("cost_mean_1000", |b| b.iter(|| Cost::mean(black_box(&costs))));
}

fn bench_factory(c: &mut Criterion) {
    let mut factory = ImplementationFactory::from_fn("bench-v1", |input, _ctx| async move {
        Ok::<_, ExecutionError>(input)
    });
    for slot in ["promptTemplate", "model", "parser"] {
        for i in 0..5 {
            factory
                .add_method(Method::new(
                    slot,
                    format!("{slot}-{i}"),
                    MethodValue::constant(i),
                ))
                .unwrap();
        }
    }
    c.bench_function("factory_125_implementations", |b| {
        b.iter(|| black_box(factory.implementations()))
    });
}

criterion_group!(benches, bench_hashing, bench_cost_ledger, bench_factory);
criterion_main!(benches);
