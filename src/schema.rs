//! Mapping from inferred source column types to warehouse column types.
//!
//! [`table_schema_for`] is a total, order-preserving function: every [`DataType`] maps to
//! exactly one [`WarehouseType`], and column `i` of the dataset becomes column `i` of the
//! table schema.

use std::fmt;

use crate::types::{DataSet, DataType};

/// Column type tag understood by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseType {
    /// `INTEGER` (64-bit signed).
    Integer,
    /// `FLOAT` (64-bit IEEE 754).
    Float,
    /// `TIMESTAMP`.
    Timestamp,
    /// `STRING`.
    String,
}

impl WarehouseType {
    /// Name used by the warehouse API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Timestamp => "TIMESTAMP",
            Self::String => "STRING",
        }
    }
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single warehouse column: name plus type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Warehouse type.
    pub field_type: WarehouseType,
}

impl ColumnSchema {
    /// Create a new column schema.
    pub fn new(name: impl Into<String>, field_type: WarehouseType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered list of warehouse columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    /// Columns in positional order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Create a table schema from columns.
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// First column name that appears more than once, if any.
    pub fn duplicate_column(&self) -> Option<&str> {
        self.columns.iter().enumerate().find_map(|(i, col)| {
            self.columns[..i]
                .iter()
                .any(|prev| prev.name == col.name)
                .then_some(col.name.as_str())
        })
    }
}

/// Warehouse type for an inferred source column type.
pub fn warehouse_type_for(data_type: &DataType) -> WarehouseType {
    match data_type {
        DataType::Int64 => WarehouseType::Integer,
        DataType::Float64 => WarehouseType::Float,
        DataType::Timestamp => WarehouseType::Timestamp,
        DataType::Bool | DataType::Utf8 => WarehouseType::String,
    }
}

/// Build the warehouse table schema for `dataset`, one column per field, in field order.
pub fn table_schema_for(dataset: &DataSet) -> TableSchema {
    TableSchema::new(
        dataset
            .schema
            .fields
            .iter()
            .map(|f| ColumnSchema::new(f.name.clone(), warehouse_type_for(&f.data_type)))
            .collect(),
    )
}
