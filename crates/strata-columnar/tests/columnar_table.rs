use pretty_assertions::assert_eq;
use strata_columnar::{
    ColumnSchema, ColumnType, ColumnarTableBuilder, DictionaryIndex, Order, TableError,
    TableOptions, Value,
};

#[test]
fn cells_survive_page_boundaries() {
    let schema = vec![
        ColumnSchema::new("gender", ColumnType::String),
        ColumnSchema::new("salary", ColumnType::Integer),
        ColumnSchema::new("hired", ColumnType::DateTime),
        ColumnSchema::new("bonus", ColumnType::Number),
        ColumnSchema::new("active", ColumnType::Boolean),
    ];
    let options = TableOptions { page_size_rows: 4 };
    let mut builder = ColumnarTableBuilder::new(schema, options);

    let rows: Vec<Vec<Value>> = (0..10i64)
        .map(|i| {
            vec![
                Value::from(if i % 2 == 0 { "M" } else { "F" }),
                if i == 7 {
                    Value::Null
                } else {
                    Value::Integer(40_000 + i * 1_000)
                },
                Value::DateTime(-86_400 * i),
                Value::Number(i as f64 / 4.0),
                Value::Boolean(i % 3 == 0),
            ]
        })
        .collect();
    for row in &rows {
        builder.append_row(row).unwrap();
    }
    let table = builder.finalize();

    assert_eq!(table.row_count(), 10);
    assert_eq!(table.column_count(), 5);
    for (r, row) in rows.iter().enumerate() {
        for (c, expected) in row.iter().enumerate() {
            assert_eq!(&table.get_cell(r, c), expected, "row {r} col {c}");
        }
    }
    assert_eq!(table.get_cell(10, 0), Value::Null);

    let codes = table.scan().dictionary_codes(0).unwrap();
    assert_eq!(codes.len(), 10);
    assert!(codes.iter().step_by(2).all(|c| *c == Some(0)));
    assert!(codes.iter().skip(1).step_by(2).all(|c| *c == Some(1)));
}

#[test]
fn mistyped_values_reject_the_row() {
    let schema = vec![
        ColumnSchema::new("gender", ColumnType::String),
        ColumnSchema::new("salary", ColumnType::Integer),
    ];
    let mut builder = ColumnarTableBuilder::new(schema, TableOptions::default());
    let err = builder
        .append_row(&[Value::from("F"), Value::from("not a number")])
        .unwrap_err();
    assert_eq!(
        err,
        TableError::SchemaMismatch {
            column: "salary".to_string(),
            expected: ColumnType::Integer,
            actual: ColumnType::String,
        }
    );
    builder
        .append_row(&[Value::from("M"), Value::Integer(5)])
        .unwrap();
    builder.append_row(&[Value::Null, Value::Null]).unwrap();
    let table = builder.finalize();

    assert_eq!(table.row_count(), 2);
    assert_eq!(table.get_cell(0, 0), Value::from("M"));
    assert_eq!(table.get_cell(0, 1), Value::Integer(5));
    assert_eq!(table.dictionary(0).unwrap().len(), 1);
}

#[test]
fn dictionary_index_paginates_buckets() {
    let schema = vec![ColumnSchema::new("gender", ColumnType::String)];
    let mut builder = ColumnarTableBuilder::new(schema, TableOptions { page_size_rows: 2 });
    for g in ["M", "F", "M", "M", "F", "M"] {
        builder.append_row(&[Value::from(g)]).unwrap();
    }
    let table = builder.finalize();
    let index = DictionaryIndex::build(&table, 0).unwrap();

    assert_eq!(index.values().len(), 2);
    assert_eq!(index.equal("M", Order::Ascending, 0, usize::MAX), vec![0, 2, 3, 5]);
    assert_eq!(index.equal("M", Order::Ascending, 1, 2), vec![2, 3]);
    assert_eq!(index.equal("M", Order::Descending, 0, 3), vec![5, 3, 2]);
    assert_eq!(index.equal("F", Order::Descending, 5, 1), Vec::<usize>::new());
    assert!(index.equal("X", Order::Ascending, 0, usize::MAX).is_empty());
}
