use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use resdef_core::{parse_expression, HostTable, Resource, Runtime, Value};
use serde_json::json;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("tiny", "build"),
    ("options", "deploy --env prod --replicas=3 -fq"),
    (
        "quoted",
        r#"say "hello world" 'single quoted' --to=everyone -- --dry-run \"escaped\""#,
    ),
];

fn generate_object(fields: usize) -> Value {
    let mut map = serde_json::Map::new();
    for i in 0..fields {
        map.insert(
            format!("field_{}", i),
            json!({"@type": "string", "@value": format!("value {}", i), "@aliases": [format!("f{}", i)]}),
        );
    }
    Value::from(serde_json::Value::Object(map))
}

fn bench_expression_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_parsing");
    for (name, source) in EXPRESSIONS {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| parse_expression(black_box(src)).unwrap());
        });
    }
    group.finish();
}

fn bench_construction_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction_scaling");
    for size in [10, 100, 1000] {
        let definition = generate_object(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &definition, |b, def| {
            b.iter(|| Resource::create(black_box(def)).unwrap());
        });
    }
    group.finish();
}

fn bench_invocation(c: &mut Criterion) {
    let host = HostTable::new().with("calculator", "add", |invocation| {
        let sum: f64 = ["a", "b"]
            .iter()
            .filter_map(|key| invocation.argument(key).and_then(Value::as_f64))
            .sum();
        Ok(Some(Value::from(sum)))
    });
    let runtime = Runtime::new().with_host(host);
    let calculator = runtime
        .create(
            &Value::from(json!({
                "@id": "calculator",
                "add": {
                    "@input": {
                        "a": {"@type": "number", "@position": 0},
                        "b": {"@type": "number", "@position": 1, "@value": 0}
                    },
                    "@before": "check",
                },
                "check": {"@input": {}, "@run": ""}
            })),
            &Default::default(),
        )
        .unwrap();

    c.bench_function("invoke_native_method", |b| {
        b.iter(|| runtime.run(&calculator, black_box("add 40 2")).unwrap());
    });
}

criterion_group!(expression_benches, bench_expression_parsing);
criterion_group!(resource_benches, bench_construction_scaling, bench_invocation);
criterion_main!(expression_benches, resource_benches);
