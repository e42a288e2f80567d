use std::str::FromStr;

use logminer_types::{
    chrono::{DateTime, FixedOffset, NaiveDateTime},
    log::warn,
    ordered_float::OrderedFloat,
    rust_decimal::Decimal,
    thiserror,
    types::{Field, FieldDefinition, FieldType, Schema, TableId},
};
use oracle::Row;

use crate::errors::DecodeError;

use super::join::Column;

/// Digits `rust_decimal` can hold, integer and fractional together.
const MAX_DECIMAL_PRECISION: i64 = 28;

/// Precision of a `NUMBER` declared without one.
const ORACLE_MAX_PRECISION: i64 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedColumn {
    pub typ: FieldType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataTypeError {
    #[error("unsupported data type {data_type} of column {column_name}")]
    UnsupportedDataType {
        column_name: String,
        data_type: String,
    },
    #[error("column {0} has null data type")]
    ColumnDataTypeIsNull(String),
    #[error(
        "column {column_name} holds up to {precision} digits, at most {MAX_DECIMAL_PRECISION} are supported"
    )]
    PrecisionTooLarge { column_name: String, precision: i64 },
    #[error("table has no columns")]
    NoColumns,
}

pub fn map_data_type(
    column_name: &str,
    data_type: Option<&str>,
    nullable: Option<&str>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> Result<MappedColumn, DataTypeError> {
    let data_type =
        data_type.ok_or_else(|| DataTypeError::ColumnDataTypeIsNull(column_name.to_string()))?;
    let typ = if data_type.starts_with("TIMESTAMP") {
        if data_type.ends_with("TIME ZONE") {
            FieldType::TimestampTz
        } else {
            FieldType::Timestamp
        }
    } else {
        match data_type {
            "VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" | "CLOB" | "NCLOB" | "ROWID" | "LONG" => {
                FieldType::String
            }
            "NUMBER" => map_number(column_name, precision, scale)?,
            "FLOAT" | "BINARY_FLOAT" | "BINARY_DOUBLE" => FieldType::Float,
            "DATE" => FieldType::Timestamp,
            "RAW" | "LONG RAW" | "BLOB" => FieldType::Binary,
            other => {
                return Err(DataTypeError::UnsupportedDataType {
                    column_name: column_name.to_string(),
                    data_type: other.to_string(),
                })
            }
        }
    };
    let nullable = nullable != Some("N");
    Ok(MappedColumn { typ, nullable })
}

fn map_number(
    column_name: &str,
    precision: Option<i64>,
    scale: Option<i64>,
) -> Result<FieldType, DataTypeError> {
    let scale = match (precision, scale) {
        // Unconstrained NUMBER has no declared scale to honour.
        (None, None) => return Ok(FieldType::Float),
        (Some(precision), None | Some(0)) if precision <= 18 => return Ok(FieldType::Int),
        // Negative scale rounds to the left of the decimal point, values are still integral.
        (_, scale) => scale.unwrap_or(0).max(0),
    };

    // Every value of the column must rescale to the declared scale.
    let max_digits = precision.unwrap_or(ORACLE_MAX_PRECISION).max(scale);
    if max_digits > MAX_DECIMAL_PRECISION {
        return Err(DataTypeError::PrecisionTooLarge {
            column_name: column_name.to_string(),
            precision: max_digits,
        });
    }
    Ok(FieldType::Decimal {
        precision: u8::try_from(max_digits).ok(),
        scale: scale as u32,
    })
}

/// Builds the value schema of `table` from its catalog columns.
///
/// The decimal scale always comes from the column declaration.
pub fn decide_schema(table: &TableId, columns: Vec<Column>) -> Result<Schema, DataTypeError> {
    if columns.is_empty() {
        return Err(DataTypeError::NoColumns);
    }

    let mut fields = vec![];
    let mut primary_index = vec![];
    for column in columns {
        let mapped = map_data_type(
            &column.name,
            column.data_type.as_deref(),
            column.nullable.as_deref(),
            column.precision,
            column.scale,
        )?;
        if column.is_primary_key {
            primary_index.push(fields.len());
        }
        fields.push(FieldDefinition::new(
            column.name,
            mapped.typ,
            mapped.nullable,
        ));
    }

    if primary_index.is_empty() {
        warn!("Table {} has no primary key", table);
    }

    Ok(Schema {
        table: table.clone(),
        fields,
        primary_index,
    })
}

/// Maps a snapshot row. Values of `schema.fields` start at column `first_index` of `row`.
pub fn map_row(schema: &Schema, row: &Row, first_index: usize) -> Result<Vec<Field>, DecodeError> {
    let actual = row.sql_values().len().saturating_sub(first_index);
    if schema.fields.len() != actual {
        return Err(DecodeError::ColumnCountMismatch {
            expected: schema.fields.len(),
            actual,
        });
    }

    schema
        .fields
        .iter()
        .enumerate()
        .map(|(index, field)| map_field(first_index + index, field, row))
        .collect()
}

fn map_field(index: usize, field: &FieldDefinition, row: &Row) -> Result<Field, DecodeError> {
    let value = match field.typ {
        FieldType::Int => row.get::<_, Option<i64>>(index)?.map(Field::Int),
        FieldType::Float => row
            .get::<_, Option<f64>>(index)?
            .map(|value| Field::Float(OrderedFloat(value))),
        FieldType::Decimal { scale, .. } => match row.get::<_, Option<String>>(index)? {
            Some(decimal) => Some(Field::Decimal(parse_decimal(
                &field.name,
                &decimal,
                scale,
            )?)),
            None => None,
        },
        FieldType::String => row.get::<_, Option<String>>(index)?.map(Field::String),
        FieldType::Binary => row.get::<_, Option<Vec<u8>>>(index)?.map(Field::Binary),
        FieldType::Timestamp => row
            .get::<_, Option<NaiveDateTime>>(index)?
            .map(Field::Timestamp),
        FieldType::TimestampTz => row
            .get::<_, Option<DateTime<FixedOffset>>>(index)?
            .map(Field::TimestampTz),
    };
    match value {
        Some(value) => Ok(value),
        None if field.nullable => Ok(Field::Null),
        None => Err(DecodeError::NullValue(field.name.clone())),
    }
}

/// Parses an Oracle number and brings it to exactly `scale` fractional digits.
///
/// Padding with zeros is lossless and always done. Dropping significant digits is not, and
/// fails.
pub fn parse_decimal(column: &str, literal: &str, scale: u32) -> Result<Decimal, DecodeError> {
    let number = normalize_number_literal(literal);
    let parsed = if number.contains(['e', 'E']) {
        Decimal::from_scientific(&number)
    } else {
        Decimal::from_str(&number)
    };
    let mut decimal = parsed.map_err(|e| DecodeError::NumberToDecimal(e, literal.to_string()))?;

    if decimal.scale() > scale {
        decimal = decimal.normalize();
    }
    if decimal.scale() <= scale {
        decimal.rescale(scale);
    }
    if decimal.scale() != scale {
        return Err(DecodeError::DecimalScale {
            column: column.to_string(),
            value: literal.to_string(),
            scale,
        });
    }
    Ok(decimal)
}

/// Oracle prints `0.5` as `.5` and `-0.5` as `-.5`.
pub(crate) fn normalize_number_literal(literal: &str) -> String {
    let literal = literal.trim();
    if let Some(rest) = literal.strip_prefix("-.") {
        format!("-0.{rest}")
    } else if let Some(rest) = literal.strip_prefix('.') {
        format!("0.{rest}")
    } else {
        literal.to_string()
    }
}
