//! Core data model types for the source side of a load.
//!
//! The source reader produces an in-memory [`DataSet`] whose [`Schema`] (a list of typed
//! [`Field`]s) is inferred from the spreadsheet cells.

use chrono::NaiveDateTime;

/// Logical data type inferred for a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// Date-time without a time zone.
    Timestamp,
    /// UTF-8 string (also the fallback for mixed columns).
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the columns of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// Date-time without a time zone.
    Timestamp(NaiveDateTime),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Whether this value may be stored in a column of `data_type`.
    pub fn conforms_to(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Null, _)
                | (Value::Int64(_), DataType::Int64)
                | (Value::Float64(_), DataType::Float64)
                | (Value::Bool(_), DataType::Bool)
                | (Value::Timestamp(_), DataType::Timestamp)
                | (Value::Utf8(_), DataType::Utf8)
        )
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields, so every
/// row has exactly `schema.fields.len()` values and each column is homogeneous.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    ///
    /// # Panics
    ///
    /// Panics if a row's length differs from the schema field count.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        let expected_len = schema.fields.len();
        for row in &rows {
            assert!(
                row.len() == expected_len,
                "row length {} does not match schema length {}",
                row.len(),
                expected_len
            );
        }
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Whether the dataset holds no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
