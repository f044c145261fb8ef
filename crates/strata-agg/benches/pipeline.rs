use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strata_agg::{
    correlate, ColumnarStore, CorrelationRequest, ExecutionMode, Extractor, KeyField,
    PipelineOptions,
};
use strata_columnar::{ColumnSchema, ColumnType, ColumnarTableBuilder, TableOptions, Value};
use std::time::Duration;

const SECONDS_PER_DAY: i64 = 86_400;

fn bench_rows() -> usize {
    std::env::var("STRATA_AGG_BENCH_ROWS")
        .ok()
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .filter(|&v| (10_000..=5_000_000).contains(&v))
        .unwrap_or(500_000)
}

fn build_store(rows: usize) -> ColumnarStore {
    let schema = vec![
        ColumnSchema::new("gender", ColumnType::String),
        ColumnSchema::new("salary", ColumnType::Integer),
        ColumnSchema::new("hire_date", ColumnType::DateTime),
        ColumnSchema::new("from_date", ColumnType::DateTime),
    ];
    let mut builder = ColumnarTableBuilder::new(schema, TableOptions::default());
    for i in 0..rows as i64 {
        let hired = (i % 10_000) * SECONDS_PER_DAY;
        let tenure = 30 + (i * 7_919) % 9_000;
        builder
            .append_row(&[
                Value::from(if i % 3 == 0 { "F" } else { "M" }),
                Value::Integer(38_000 + (i * 104_729) % 120_000),
                Value::DateTime(hired),
                Value::DateTime(hired + tenure * SECONDS_PER_DAY),
            ])
            .unwrap();
    }
    ColumnarStore::new(builder.finalize())
}

fn bench_salary_correlation(c: &mut Criterion) {
    let rows = bench_rows();
    let store = build_store(rows);

    let days_employed = (Extractor::field_or("from_date", 0i64)
        - Extractor::field_or("hire_date", 0i64))
    .to_float()
        * Extractor::constant(1.0 / SECONDS_PER_DAY as f64);
    let request = CorrelationRequest::new(
        KeyField::new("gender").with_domain(["M", "F"]),
        Extractor::field("salary"),
        days_employed,
    );

    let mut group = c.benchmark_group("salary_correlation");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(rows as u64));

    for (label, execution) in [
        ("sequential", ExecutionMode::Sequential),
        ("parallel", ExecutionMode::Parallel),
    ] {
        let options = PipelineOptions {
            execution,
            ..PipelineOptions::default()
        };
        group.bench_with_input(BenchmarkId::new(label, rows), &rows, |b, _| {
            b.iter(|| {
                let reports = correlate(&store, &request, options.clone()).unwrap();
                black_box(reports);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_salary_correlation);
criterion_main!(benches);
