//! Correlation between salary and days of employment, per gender, over a synthetic payroll table.
//!
//! ```text
//! cargo run -p strata-agg --example salary_correlation -- 250000
//! ```

use serde_json::{json, Value as Json};
use strata_agg::{
    correlate, AggResult, ColumnarStore, CorrelationReport, CorrelationRequest, Extractor,
    KeyField, PipelineOptions,
};
use strata_columnar::{ColumnSchema, ColumnType, ColumnarTableBuilder, TableOptions, Value};

const SECONDS_PER_DAY: i64 = 86_400;

fn payroll(rows: usize) -> AggResult<ColumnarStore> {
    let schema = vec![
        ColumnSchema::new("gender", ColumnType::String),
        ColumnSchema::new("salary", ColumnType::Integer),
        ColumnSchema::new("hire_date", ColumnType::DateTime),
        ColumnSchema::new("from_date", ColumnType::DateTime),
    ];
    let mut builder = ColumnarTableBuilder::new(schema, TableOptions::default());
    for i in 0..rows as i64 {
        let hired = (i * 31 % 12_000) * SECONDS_PER_DAY;
        let tenure = 60 + (i * 7_919) % 8_000;
        let salary = 39_000 + tenure * 5 + (i * 104_729) % 40_000;
        builder.append_row(&[
            Value::from(if i % 5 < 2 { "F" } else { "M" }),
            Value::Integer(salary),
            Value::DateTime(hired),
            Value::DateTime(hired + tenure * SECONDS_PER_DAY),
        ])?;
    }
    Ok(ColumnarStore::new(builder.finalize()))
}

fn rounded(value: f64, places: i32) -> Json {
    let scale = 10f64.powi(places);
    json!((value * scale).round() / scale)
}

fn label(key: &str) -> &str {
    match key {
        "M" => "men",
        "F" => "women",
        other => other,
    }
}

fn render(report: &CorrelationReport) -> Json {
    json!({
        "gender": label(report.key.as_str()),
        "count": report.count,
        "salary": {
            "mean": rounded(report.x.mean, 2),
            "variance": rounded(report.x.variance, 5),
        },
        "daysEmployed": {
            "mean": rounded(report.y.mean, 2),
            "variance": rounded(report.y.variance, 5),
        },
        "covariance": rounded(report.covariance, 5),
        "correlation": rounded(report.correlation, 5),
    })
}

fn main() -> AggResult<()> {
    let rows = std::env::args()
        .nth(1)
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .unwrap_or(100_000);
    let store = payroll(rows)?;

    let days_employed = (Extractor::field_or("from_date", 0i64)
        - Extractor::field_or("hire_date", 0i64))
    .to_float()
        * Extractor::constant(1.0 / SECONDS_PER_DAY as f64);
    let request = CorrelationRequest::new(
        KeyField::new("gender").with_domain(["M", "F"]),
        Extractor::field("salary"),
        days_employed,
    );

    let reports = correlate(&store, &request, PipelineOptions::from_env())?;
    let rendered: Vec<Json> = reports.iter().map(render).collect();
    println!("{}", Json::Array(rendered));
    Ok(())
}
