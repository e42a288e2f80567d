use logminer_types::{
    chrono::{DateTime, FixedOffset, NaiveDateTime},
    ordered_float::OrderedFloat,
    types::{Field, FieldDefinition, FieldType, Row, Schema},
};
use memchr::memchr;

use crate::{
    connector::mapping::{normalize_number_literal, parse_decimal},
    errors::{DecodeError, ParseDateError},
};

use super::parse::ParsedRow;

/// Builds a full row image. Columns the statement doesn't mention are `Null`.
pub fn map_row(schema: &Schema, row: &ParsedRow) -> Result<Row, DecodeError> {
    let image = schema
        .fields
        .iter()
        .map(|field| (field.name.clone(), Field::Null))
        .collect();
    overlay_row(schema, image, row)
}

/// Declared columns `row` doesn't assign, in schema order.
pub fn unlogged_columns(schema: &Schema, row: &ParsedRow) -> Vec<String> {
    schema
        .field_names()
        .filter(|name| row.iter().all(|(column, _)| column != name))
        .map(str::to_string)
        .collect()
}

/// Replaces the columns of `image` that `row` assigns.
pub fn overlay_row(schema: &Schema, mut image: Row, row: &ParsedRow) -> Result<Row, DecodeError> {
    for &(column, literal) in row {
        let field = schema
            .field(column)
            .ok_or_else(|| DecodeError::UnknownColumn {
                table: schema.table.clone(),
                column: column.to_string(),
            })?;
        let value = map_value(literal, field)?;
        if let Some(slot) = image.get_mut(column) {
            *slot = value;
        }
    }
    Ok(image)
}

fn map_value(literal: Option<&str>, field: &FieldDefinition) -> Result<Field, DecodeError> {
    let Some(literal) = literal else {
        if field.nullable {
            return Ok(Field::Null);
        } else {
            return Err(DecodeError::NullValue(field.name.clone()));
        }
    };
    match field.typ {
        FieldType::Int => {
            let number = unquote_number(literal);
            Ok(Field::Int(
                number
                    .parse()
                    .map_err(|e| DecodeError::ParseInt(e, literal.to_string()))?,
            ))
        }
        FieldType::Float => {
            let number = normalize_number_literal(unquote_number(literal));
            Ok(Field::Float(OrderedFloat(
                number
                    .parse()
                    .map_err(|e| DecodeError::ParseFloat(e, literal.to_string()))?,
            )))
        }
        FieldType::Decimal { scale, .. } => Ok(Field::Decimal(parse_decimal(
            &field.name,
            unquote_number(literal),
            scale,
        )?)),
        FieldType::String => Ok(Field::String(parse_string(literal)?)),
        FieldType::Binary => Ok(Field::Binary(parse_binary(literal)?)),
        FieldType::Timestamp => Ok(Field::Timestamp(
            parse_date_time(literal)
                .map_err(|e| DecodeError::ParseDateTime(e, literal.to_string()))?,
        )),
        FieldType::TimestampTz => Ok(Field::TimestampTz(
            parse_date_time_tz(literal)
                .map_err(|e| DecodeError::ParseDateTime(e, literal.to_string()))?,
        )),
    }
}

/// Numbers are unquoted in redo, except binary floats and doubles.
fn unquote_number(literal: &str) -> &str {
    literal
        .strip_prefix('\'')
        .and_then(|literal| literal.strip_suffix('\''))
        .unwrap_or(literal)
}

/// Contents of a single quoted literal, `''` unescaped.
fn quoted_content(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

fn parse_string(literal: &str) -> Result<String, DecodeError> {
    if literal == "EMPTY_CLOB()" {
        return Ok(String::new());
    }
    if let Some(unistr) = literal
        .strip_prefix("UNISTR(")
        .and_then(|unistr| unistr.strip_suffix(')'))
    {
        return quoted_content(unistr)
            .and_then(|content| decode_unistr(&content))
            .ok_or_else(|| DecodeError::StringLiteral(literal.to_string()));
    }
    quoted_content(literal).ok_or_else(|| DecodeError::StringLiteral(literal.to_string()))
}

/// `UNISTR` escapes are `\XXXX` UTF-16 code units, `\\` is a backslash.
fn decode_unistr(content: &str) -> Option<String> {
    let mut units = vec![];
    let mut rest = content;
    while !rest.is_empty() {
        if let Some(escaped) = rest.strip_prefix('\\') {
            if let Some(after) = escaped.strip_prefix('\\') {
                units.push(u16::from(b'\\'));
                rest = after;
            } else {
                let hex = escaped.get(..4)?;
                units.push(u16::from_str_radix(hex, 16).ok()?);
                rest = &escaped[4..];
            }
        } else {
            let next = rest.chars().next()?;
            let mut buffer = [0; 2];
            units.extend_from_slice(next.encode_utf16(&mut buffer));
            rest = &rest[next.len_utf8()..];
        }
    }
    String::from_utf16(&units).ok()
}

fn parse_binary(literal: &str) -> Result<Vec<u8>, DecodeError> {
    if literal == "EMPTY_BLOB()" {
        return Ok(vec![]);
    }
    let error = || DecodeError::BinaryLiteral(literal.to_string());
    let hex = literal
        .strip_prefix("HEXTORAW(")
        .and_then(|hex| hex.strip_suffix(')'))
        .and_then(quoted_content)
        .ok_or_else(error)?;
    if hex.len() % 2 != 0 {
        return Err(error());
    }
    (0..hex.len())
        .step_by(2)
        .map(|index| {
            hex.get(index..index + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(error)
        })
        .collect()
}

/// The first quoted argument of `TO_DATE(...)`, `TO_TIMESTAMP(...)` or `TO_TIMESTAMP_TZ(...)`.
fn function_argument<'a>(literal: &'a str, function: &str) -> Result<&'a str, ParseDateError> {
    let argument = literal
        .strip_prefix(function)
        .and_then(|rest| rest.strip_prefix("('"))
        .ok_or(ParseDateError::Oracle)?;
    let end = memchr(b'\'', argument.as_bytes()).ok_or(ParseDateError::Oracle)?;
    Ok(&argument[..end])
}

fn parse_naive(string: &str) -> Result<NaiveDateTime, ParseDateError> {
    let format = if string.contains('.') {
        "%Y-%m-%d %H:%M:%S%.f"
    } else {
        "%Y-%m-%d %H:%M:%S"
    };
    Ok(NaiveDateTime::parse_from_str(string, format)?)
}

fn parse_date_time(literal: &str) -> Result<NaiveDateTime, ParseDateError> {
    const TO_DATE: &str = "TO_DATE";
    const TO_TIMESTAMP: &str = "TO_TIMESTAMP";

    let string = function_argument(literal, TO_DATE)
        .or_else(|_| function_argument(literal, TO_TIMESTAMP))?;
    parse_naive(string)
}

/// Local time zone columns are logged without an offset and taken as UTC.
fn parse_date_time_tz(literal: &str) -> Result<DateTime<FixedOffset>, ParseDateError> {
    const TO_TIMESTAMP_TZ: &str = "TO_TIMESTAMP_TZ";

    if let Ok(string) = function_argument(literal, TO_TIMESTAMP_TZ) {
        if let Ok(date_time) = DateTime::parse_from_str(string, "%Y-%m-%d %H:%M:%S%.f %:z") {
            return Ok(date_time);
        }
        return Ok(parse_naive(string)?.and_utc().fixed_offset());
    }
    Ok(parse_date_time(literal)?.and_utc().fixed_offset())
}
