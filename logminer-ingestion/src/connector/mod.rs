use std::collections::HashMap;

use logminer_types::{
    log::debug,
    offset::Scn,
    thiserror,
    types::{Field, Schema, TableId},
};
use oracle::Connection;

use crate::{errors::DecodeError, window::ScnWindow};

use self::{
    join::Column,
    replicate::log::{LogMinerContent, RedoLog},
};

/// A database failure, normalised so that it can be classified by ORA code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{message}", .code.map(|code| format!("ORA-{code:05}: ")).unwrap_or_default())]
pub struct DbError {
    pub code: Option<i32>,
    pub message: String,
}

impl DbError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The redo or undo needed for the requested position is gone. Retrying cannot help.
    pub fn is_log_unavailable(&self) -> bool {
        matches!(
            self.code,
            Some(1291 | 1292 | 1281 | 308 | 1284 | 1555 | 8181)
        )
    }

    /// Connectivity problems worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            Some(3113 | 3114 | 3135 | 12170 | 12541 | 12543 | 12571 | 25408 | 1033 | 1089)
        )
    }
}

impl From<oracle::Error> for DbError {
    fn from(error: oracle::Error) -> Self {
        match &error {
            oracle::Error::OciError(db_error) | oracle::Error::DpiError(db_error) => {
                DbError::new(Some(db_error.code()), db_error.message())
            }
            _ => DbError::new(None, error.to_string()),
        }
    }
}

/// Which rows of `V$LOGMNR_CONTENTS` a window needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilter {
    pub tables: Vec<TableId>,
    pub con_id: Option<u32>,
}

impl ContentFilter {
    /// Whether `content` is a row of a monitored table rather than transaction control.
    pub fn is_monitored(&self, content: &LogMinerContent) -> bool {
        match (&content.seg_owner, &content.table_name) {
            (Some(owner), Some(name)) => self
                .tables
                .iter()
                .any(|table| table.owner() == owner && table.name() == name),
            _ => false,
        }
    }
}

/// A row read by the snapshot, with the ROWID it was read at.
#[derive(Debug)]
pub struct SnapshotRow {
    pub rowid: String,
    pub values: Result<Vec<Field>, DecodeError>,
}

/// Everything the engine asks of the database.
///
/// All calls block the calling thread.
pub trait LogMinerConnection {
    /// Fixes the NLS formats so literals in redo SQL have a known shape.
    fn prepare_session(&self) -> Result<(), DbError>;

    fn current_scn(&self) -> Result<Scn, DbError>;

    /// Start SCN of the oldest transaction still open, `None` if there is none.
    fn oldest_active_transaction_scn(&self) -> Result<Option<Scn>, DbError>;

    /// Online and archived redo logs overlapping `window`, ordered by sequence.
    fn list_logs(&self, window: ScnWindow) -> Result<Vec<RedoLog>, DbError>;

    fn start_log_miner(
        &self,
        window: ScnWindow,
        logs: &[RedoLog],
        continuous_mine: bool,
    ) -> Result<(), DbError>;

    /// Mined rows of the started window, in SCN order.
    fn contents(
        &self,
        window: ScnWindow,
        filter: &ContentFilter,
    ) -> Result<Vec<LogMinerContent>, DbError>;

    fn end_log_miner(&self) -> Result<(), DbError>;

    /// Catalog columns of `tables`, in column order. Missing tables are absent from the map.
    fn describe_tables(&self, tables: &[TableId])
        -> Result<HashMap<TableId, Vec<Column>>, DbError>;

    /// Up to `limit` rows of `schema.table` as of `scn`, ordered by ROWID, after `after_rowid`.
    fn snapshot(
        &self,
        schema: &Schema,
        scn: Scn,
        after_rowid: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SnapshotRow>, DbError>;
}

/// `oracle`'s `ToSql` implementation for `&str` uses `NVARCHAR2` type, which Oracle expects to be UTF16 encoded by default.
/// Here we use `VARCHAR2` type instead, which Oracle expects to be UTF8 encoded by default.
/// This is a macro because it references a temporary `OracleType`.
macro_rules! str_to_sql {
    ($s:expr) => {
        // `s.len()` is the upper bound of `s.chars().count()`
        (
            &$s,
            &::oracle::sql_type::OracleType::Varchar2($s.len() as u32),
        )
    };
}

pub(crate) use str_to_sql;

/// Renders `value` as a SQL string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `(OWNER = 'A' AND TABLE_NAME = 'B') OR ...` for the given column names.
pub(crate) fn table_predicate(tables: &[TableId], owner_column: &str, name_column: &str) -> String {
    if tables.is_empty() {
        return "1 = 0".to_string();
    }
    tables
        .iter()
        .map(|table| {
            format!(
                "({} = {} AND {} = {})",
                owner_column,
                quote_literal(table.owner()),
                name_column,
                quote_literal(table.name())
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

const NLS_STATEMENTS: [&str; 4] = [
    "ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS'",
    "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF9'",
    "ALTER SESSION SET NLS_TIMESTAMP_TZ_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF9 TZH:TZM'",
    "ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'",
];

impl LogMinerConnection for Connection {
    fn prepare_session(&self) -> Result<(), DbError> {
        for sql in NLS_STATEMENTS {
            debug!("{}", sql);
            self.execute(sql, &[])?;
        }
        Ok(())
    }

    fn current_scn(&self) -> Result<Scn, DbError> {
        let sql = "SELECT DBMS_FLASHBACK.GET_SYSTEM_CHANGE_NUMBER() FROM DUAL";
        debug!("{}", sql);
        let scn = self.query_row_as::<Scn>(sql, &[])?;
        self.commit()?;
        Ok(scn)
    }

    fn oldest_active_transaction_scn(&self) -> Result<Option<Scn>, DbError> {
        let sql = "SELECT MIN(START_SCN) FROM V$TRANSACTION";
        debug!("{}", sql);
        let scn = self.query_row_as::<Option<Scn>>(sql, &[])?;
        self.commit()?;
        Ok(scn)
    }

    fn list_logs(&self, window: ScnWindow) -> Result<Vec<RedoLog>, DbError> {
        replicate::log::listing::list(self, window)
    }

    fn start_log_miner(
        &self,
        window: ScnWindow,
        logs: &[RedoLog],
        continuous_mine: bool,
    ) -> Result<(), DbError> {
        replicate::log::redo::start(self, window, logs, continuous_mine)
    }

    fn contents(
        &self,
        window: ScnWindow,
        filter: &ContentFilter,
    ) -> Result<Vec<LogMinerContent>, DbError> {
        replicate::log::redo::contents(self, window, filter)
    }

    fn end_log_miner(&self) -> Result<(), DbError> {
        replicate::log::redo::end(self)
    }

    fn describe_tables(
        &self,
        tables: &[TableId],
    ) -> Result<HashMap<TableId, Vec<Column>>, DbError> {
        if tables.is_empty() {
            return Ok(HashMap::new());
        }
        let columns = listing::list_columns(self, tables)?;
        let primary_key_columns = listing::list_primary_key_columns(self, tables)?;
        self.commit()?;
        Ok(join::group_by_table(columns, &primary_key_columns))
    }

    fn snapshot(
        &self,
        schema: &Schema,
        scn: Scn,
        after_rowid: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SnapshotRow>, DbError> {
        let columns = schema
            .fields
            .iter()
            .map(|field| format!("\"{}\"", field.name))
            .collect::<Vec<_>>()
            .join(", ");
        let rowid_filter = if after_rowid.is_some() {
            "WHERE ROWID > CHARTOROWID(:after_rowid)"
        } else {
            ""
        };
        let sql = format!(
            "SELECT * FROM (
                SELECT ROWIDTOCHAR(ROWID), {} FROM {} AS OF SCN :scn {} ORDER BY ROWID
            ) WHERE ROWNUM <= :limit",
            columns,
            schema.table.quoted_name(),
            rowid_filter
        );
        let limit = limit as u64;
        debug!("{}, {}, {:?}, {}", sql, scn, after_rowid, limit);
        let rows = match after_rowid {
            Some(rowid) => self.query_named(
                &sql,
                &[
                    ("scn", &scn),
                    ("after_rowid", &str_to_sql!(rowid)),
                    ("limit", &limit),
                ],
            )?,
            None => self.query_named(&sql, &[("scn", &scn), ("limit", &limit)])?,
        };

        let mut result = vec![];
        for row in rows {
            let row = row?;
            let rowid: String = row.get(0)?;
            result.push(SnapshotRow {
                rowid,
                values: mapping::map_row(schema, &row, 1),
            });
        }
        self.commit()?;
        Ok(result)
    }
}

pub mod join;
pub(crate) mod listing;
pub mod mapping;
pub mod replicate;
