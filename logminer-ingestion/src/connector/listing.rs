use std::collections::HashSet;

use logminer_types::{log::debug, types::TableId};
use oracle::Connection;

use super::{join::Column, table_predicate, DbError};

/// Columns of `tables` in declaration order, none of them marked as primary key yet.
pub fn list_columns(
    connection: &Connection,
    tables: &[TableId],
) -> Result<Vec<(TableId, Column)>, DbError> {
    let sql = format!(
        "
        SELECT OWNER, TABLE_NAME, COLUMN_NAME, DATA_TYPE, NULLABLE, DATA_PRECISION, DATA_SCALE
        FROM ALL_TAB_COLUMNS
        WHERE {}
        ORDER BY OWNER, TABLE_NAME, COLUMN_ID
        ",
        table_predicate(tables, "OWNER", "TABLE_NAME")
    );
    debug!("{}", sql);
    let rows = connection.query_as::<(
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        Option<i64>,
        Option<i64>,
    )>(&sql, &[])?;

    rows.map(|row| -> Result<_, DbError> {
        let (owner, table_name, name, data_type, nullable, precision, scale) = row?;
        Ok((
            TableId::new(owner, table_name),
            Column {
                name,
                data_type,
                nullable,
                is_primary_key: false,
                precision,
                scale,
            },
        ))
    })
    .collect()
}

/// `(table, column)` pairs that are part of a primary key.
pub fn list_primary_key_columns(
    connection: &Connection,
    tables: &[TableId],
) -> Result<HashSet<(TableId, String)>, DbError> {
    let sql = format!(
        "
        SELECT COLS.OWNER, COLS.TABLE_NAME, COLS.COLUMN_NAME
        FROM ALL_CONSTRAINTS CONS
        JOIN ALL_CONS_COLUMNS COLS
            ON COLS.OWNER = CONS.OWNER AND COLS.CONSTRAINT_NAME = CONS.CONSTRAINT_NAME
        WHERE CONS.CONSTRAINT_TYPE = 'P' AND ({})
        ",
        table_predicate(tables, "CONS.OWNER", "CONS.TABLE_NAME")
    );
    debug!("{}", sql);
    let rows = connection.query_as::<(String, String, Option<String>)>(&sql, &[])?;

    let mut primary_key_columns = HashSet::new();
    for row in rows {
        if let (owner, table_name, Some(column_name)) = row? {
            primary_key_columns.insert((TableId::new(owner, table_name), column_name));
        }
    }
    Ok(primary_key_columns)
}
