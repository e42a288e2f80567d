use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::offset::Offset;

/// A monitored table, identified by its owning schema and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    owner: String,
    name: String,
}

impl TableId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `OWNER.NAME`, as it appears in output records.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    /// `"OWNER"."NAME"`, as it appears in SQL.
    pub fn quoted_name(&self) -> String {
        format!("\"{}\".\"{}\"", self.owner, self.name)
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    Float,
    /// A decimal whose values always carry exactly `scale` fractional digits.
    Decimal {
        precision: Option<u8>,
        scale: u32,
    },
    String,
    Binary,
    Timestamp,
    TimestampTz,
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Int => f.write_str("int"),
            FieldType::Float => f.write_str("float"),
            FieldType::Decimal {
                precision: Some(precision),
                scale,
            } => write!(f, "decimal({precision}, {scale})"),
            FieldType::Decimal {
                precision: None,
                scale,
            } => write!(f, "decimal(*, {scale})"),
            FieldType::String => f.write_str("string"),
            FieldType::Binary => f.write_str("binary"),
            FieldType::Timestamp => f.write_str("timestamp"),
            FieldType::TimestampTz => f.write_str("timestamp with time zone"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Int(i64),
    Float(OrderedFloat<f64>),
    Decimal(Decimal),
    String(String),
    Binary(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Null,
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Field::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&Decimal> {
        match self {
            Field::Decimal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Field::String(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this value may be stored in a column of type `typ`.
    ///
    /// `Null` matches every type; nullability is checked separately. Decimals must carry the
    /// declared scale exactly.
    pub fn matches(&self, typ: FieldType) -> bool {
        match (self, typ) {
            (Field::Null, _) => true,
            (Field::Int(_), FieldType::Int) => true,
            (Field::Float(_), FieldType::Float) => true,
            (Field::Decimal(value), FieldType::Decimal { scale, .. }) => value.scale() == scale,
            (Field::String(_), FieldType::String) => true,
            (Field::Binary(_), FieldType::Binary) => true,
            (Field::Timestamp(_), FieldType::Timestamp) => true,
            (Field::TimestampTz(_), FieldType::TimestampTz) => true,
            _ => false,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(value) => write!(f, "{value}"),
            Field::Float(value) => write!(f, "{value}"),
            Field::Decimal(value) => write!(f, "{value}"),
            Field::String(value) => write!(f, "{value}"),
            Field::Binary(value) => write!(f, "{value:02X?}"),
            Field::Timestamp(value) => write!(f, "{value}"),
            Field::TimestampTz(value) => write!(f, "{value}"),
            Field::Null => f.write_str("NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub typ: FieldType,
    pub nullable: bool,
}

impl FieldDefinition {
    pub fn new(name: String, typ: FieldType, nullable: bool) -> Self {
        Self {
            name,
            typ,
            nullable,
        }
    }
}

/// The value schema of a table.
///
/// A schema is never edited once built. Re-deriving a table's schema produces a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub table: TableId,
    /// Column definitions, in catalog order.
    pub fields: Vec<FieldDefinition>,
    /// Indexes of the fields forming the primary key. May be empty.
    pub primary_index: Vec<usize>,
}

impl Schema {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Checks that `row` has exactly the declared columns and every value fits its column.
    pub fn conforms(&self, row: &Row) -> bool {
        row.len() == self.fields.len()
            && self.fields.iter().all(|field| {
                row.get(&field.name).map_or(false, |value| {
                    value.matches(field.typ) && (field.nullable || !value.is_null())
                })
            })
    }
}

/// A row image: column name to value, in schema order.
pub type Row = IndexMap<String, Field>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// A row read by the initial snapshot.
    Read,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn has_before(&self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }

    pub fn has_after(&self) -> bool {
        matches!(self, Operation::Read | Operation::Insert | Operation::Update)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Read => "READ",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        })
    }
}

/// One row change.
///
/// Only the per-operation constructors create records, so presence of `before` and `after`
/// always agrees with `operation`.
///
/// Images always carry every declared column. Columns the redo statement didn't log are listed
/// in `unlogged_columns` and hold `Null` whatever their nullability, so `Schema::conforms` only
/// holds for images of records where that list is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdcRecord {
    operation: Operation,
    table: TableId,
    before: Option<Row>,
    after: Option<Row>,
    data_schema: Arc<Schema>,
    #[serde(default)]
    unlogged_columns: Vec<String>,
}

impl CdcRecord {
    pub fn read(after: Row, data_schema: Arc<Schema>) -> Self {
        Self::new(Operation::Read, None, Some(after), data_schema)
    }

    pub fn insert(after: Row, data_schema: Arc<Schema>) -> Self {
        Self::new(Operation::Insert, None, Some(after), data_schema)
    }

    pub fn update(before: Row, after: Row, data_schema: Arc<Schema>) -> Self {
        Self::new(Operation::Update, Some(before), Some(after), data_schema)
    }

    pub fn delete(before: Row, data_schema: Arc<Schema>) -> Self {
        Self::new(Operation::Delete, Some(before), None, data_schema)
    }

    fn new(
        operation: Operation,
        before: Option<Row>,
        after: Option<Row>,
        data_schema: Arc<Schema>,
    ) -> Self {
        Self {
            operation,
            table: data_schema.table.clone(),
            before,
            after,
            data_schema,
            unlogged_columns: vec![],
        }
    }

    pub fn with_unlogged_columns(mut self, unlogged_columns: Vec<String>) -> Self {
        self.unlogged_columns = unlogged_columns;
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn before(&self) -> Option<&Row> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Row> {
        self.after.as_ref()
    }

    pub fn data_schema(&self) -> &Arc<Schema> {
        &self.data_schema
    }

    /// Columns holding a `Null` placeholder in at least one image.
    pub fn unlogged_columns(&self) -> &[String] {
        &self.unlogged_columns
    }

    /// Every image holds the logged value of every column.
    pub fn is_complete(&self) -> bool {
        self.unlogged_columns.is_empty()
    }
}

/// The unit of delivery: a record and the position to resume from to see it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub cdc_record: CdcRecord,
    pub offset: Offset,
}
