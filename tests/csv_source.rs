use std::path::PathBuf;

use sheetload::error::Error;
use sheetload::ingestion::{read_source, SourceOptions};
use sheetload::schema::{table_schema_for, WarehouseType};
use sheetload::types::{DataType, Value};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn orders_csv_matches_workbook_inference() {
    let ds = read_source(fixture("orders.csv"), &SourceOptions::default()).unwrap();
    assert_eq!(ds.row_count(), 3);

    let schema = table_schema_for(&ds);
    let types: Vec<WarehouseType> = schema.columns.iter().map(|c| c.field_type).collect();
    assert_eq!(
        types,
        vec![
            WarehouseType::Integer,
            WarehouseType::Float,
            WarehouseType::Timestamp,
            WarehouseType::String,
        ]
    );
    assert_eq!(ds.rows[2][1], Value::Null);
    assert_eq!(ds.rows[2][3], Value::Utf8("Linus".to_string()));
}

#[test]
fn header_only_csv_is_graceful() {
    let err = read_source(fixture("header_only.csv"), &SourceOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyDataset { .. }));
    assert_eq!(err.exit_code(), 0);
}

#[test]
fn blank_rows_are_skipped_and_gaps_widen_types() {
    let ds = read_source(fixture("sparse.csv"), &SourceOptions::default()).unwrap();
    assert_eq!(ds.row_count(), 2);

    let types: Vec<DataType> = ds.schema.fields.iter().map(|f| f.data_type).collect();
    // A boolean column is only kept as such without gaps; `count` has one, `note` is text.
    assert_eq!(types, vec![DataType::Bool, DataType::Float64, DataType::Utf8]);
    assert_eq!(ds.rows[1][0], Value::Bool(false));
    assert_eq!(ds.rows[0][1], Value::Float64(1.0));
    assert_eq!(ds.rows[0][2], Value::Null);
}

#[test]
fn text_columns_are_loaded_verbatim() {
    let ds = read_source(fixture("raw_text.csv"), &SourceOptions::default()).unwrap();
    assert_eq!(ds.schema.fields[0].data_type, DataType::Utf8);
    assert_eq!(ds.schema.fields[1].data_type, DataType::Int64);

    let names: Vec<&Value> = ds.rows.iter().map(|r| &r[0]).collect();
    assert_eq!(
        names,
        vec![
            &Value::Utf8("Bob".to_string()),
            &Value::Utf8("infinity".to_string()),
            &Value::Utf8("Nan".to_string()),
            &Value::Utf8("  padded  ".to_string()),
        ]
    );
}
