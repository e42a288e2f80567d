#![allow(clippy::enum_variant_names)]
use std::num::{ParseFloatError, ParseIntError};

use logminer_types::{
    chrono,
    offset::Scn,
    rust_decimal,
    thiserror::{self, Error},
    types::TableId,
};

use crate::connector::{mapping::DataTypeError, DbError};

/// What `maybe_start_query` and `poll` fail with.
#[derive(Error, Debug)]
pub enum LogminerError {
    #[error(transparent)]
    SessionStart(#[from] SessionStartError),

    #[error(transparent)]
    WindowAdvance(#[from] WindowAdvanceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("schema refresh failed: {0}")]
    SchemaRefresh(#[source] SchemaError),

    #[error("no mining session, call maybe_start_query first")]
    NotStarted,
}

/// Fatal for the resume point it was raised for. The caller must not skip forward.
#[derive(Error, Debug)]
pub enum SessionStartError {
    #[error("redo or undo data needed from SCN {scn} is no longer available: {source}")]
    LogUnavailable {
        scn: Scn,
        #[source]
        source: DbError,
    },

    #[error("redo log does not cover SCN {scn}, oldest available is {oldest:?}")]
    LogGap { scn: Scn, oldest: Option<Scn> },

    #[error("gave up starting session after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: DbError,
    },

    #[error("database error during session start: {0}")]
    Database(#[source] DbError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid redo statement pattern: {0}")]
    Parser(#[source] regex::Error),
}

#[derive(Error, Debug)]
pub enum WindowAdvanceError {
    #[error("gave up advancing to window {start}..={end} after {attempts} attempts: {source}")]
    RetriesExhausted {
        start: Scn,
        end: Scn,
        attempts: u32,
        #[source]
        source: DbError,
    },
}

#[derive(Error, Debug)]
#[error("gave up fetching window {start}..={end} after {attempts} attempts: {source}")]
pub struct FetchError {
    pub start: Scn,
    pub end: Scn,
    pub attempts: u32,
    #[source]
    pub source: DbError,
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("table not found: {0}")]
    TableNotFound(TableId),

    #[error("table {table}: {source}")]
    DataType {
        table: TableId,
        #[source]
        source: DataTypeError,
    },
}

#[derive(Debug, Error)]
pub enum ParseDateError {
    #[error("Invalid date format: {0}")]
    Chrono(#[from] chrono::ParseError),
    #[error("Invalid oracle format")]
    Oracle,
}

/// A single row could not be decoded. The row is skipped and counted.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{kind} failed to match: {sql_redo}")]
    StatementMismatch {
        kind: &'static str,
        sql_redo: String,
    },

    #[error("cannot parse column assignment: {0}")]
    AssignmentMismatch(String),

    #[error("no schema for table {0}")]
    UnknownTable(TableId),

    #[error("column {column} is not part of table {table}")]
    UnknownColumn { table: TableId, column: String },

    #[error("column count mismatch: expected {expected}, actual {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("null value for non-nullable field {0}")]
    NullValue(String),

    #[error("cannot parse float {1}: {0}")]
    ParseFloat(#[source] ParseFloatError, String),

    #[error("cannot parse int {1}: {0}")]
    ParseInt(#[source] ParseIntError, String),

    #[error("cannot convert Oracle number to decimal: {0}. Number: {1}")]
    NumberToDecimal(#[source] rust_decimal::Error, String),

    #[error("decimal {value} of column {column} has more than {scale} fractional digits")]
    DecimalScale {
        column: String,
        value: String,
        scale: u32,
    },

    #[error("cannot parse date time from {1}: {0}")]
    ParseDateTime(#[source] ParseDateError, String),

    #[error("invalid string literal: {0}")]
    StringLiteral(String),

    #[error("invalid binary literal: {0}")]
    BinaryLiteral(String),

    #[error("database error while reading value: {0}")]
    Database(#[from] DbError),
}

impl From<oracle::Error> for DecodeError {
    fn from(error: oracle::Error) -> Self {
        DecodeError::Database(error.into())
    }
}
