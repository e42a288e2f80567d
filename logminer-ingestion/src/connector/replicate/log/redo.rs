use logminer_types::{log::debug, offset::Scn};
use oracle::{Connection, RowValue};

use crate::{
    connector::{str_to_sql, table_predicate, ContentFilter, DbError},
    window::ScnWindow,
};

use super::{LogMinerContent, RedoLog};

pub fn add_logfiles(connection: &Connection, logs: &[RedoLog]) -> Result<(), DbError> {
    for (index, log) in logs.iter().enumerate() {
        let sql = if index == 0 {
            "BEGIN DBMS_LOGMNR.ADD_LOGFILE(LOGFILENAME => :name, OPTIONS => DBMS_LOGMNR.NEW); END;"
        } else {
            "BEGIN DBMS_LOGMNR.ADD_LOGFILE(LOGFILENAME => :name, OPTIONS => DBMS_LOGMNR.ADDFILE); END;"
        };
        debug!("{}, {}", sql, log.name);
        connection.execute(sql, &[&str_to_sql!(log.name)])?;
    }
    Ok(())
}

fn start_options(continuous_mine: bool) -> String {
    let mut options = "DBMS_LOGMNR.DICT_FROM_ONLINE_CATALOG + \
                       DBMS_LOGMNR.PRINT_PRETTY_SQL + \
                       DBMS_LOGMNR.NO_ROWID_IN_STMT"
        .to_string();
    if continuous_mine {
        options.push_str(" + DBMS_LOGMNR.CONTINUOUS_MINE");
    }
    options
}

pub fn start(
    connection: &Connection,
    window: ScnWindow,
    logs: &[RedoLog],
    continuous_mine: bool,
) -> Result<(), DbError> {
    if !continuous_mine {
        add_logfiles(connection, logs)?;
    }

    let sql = format!(
        "
        BEGIN
            DBMS_LOGMNR.START_LOGMNR(
                STARTSCN => :start_scn,
                ENDSCN => :end_scn,
                OPTIONS => {}
            );
        END;",
        start_options(continuous_mine)
    );
    debug!("{}, {}", sql, window);
    connection.execute_named(
        &sql,
        &[("start_scn", &window.start), ("end_scn", &window.end)],
    )?;
    Ok(())
}

fn contents_sql(filter: &ContentFilter) -> String {
    let mut sql = format!(
        "SELECT SCN, XID, PXID, OPERATION_CODE, SEG_OWNER, TABLE_NAME, SQL_REDO, CSF \
         FROM V$LOGMNR_CONTENTS \
         WHERE SCN BETWEEN :start_scn AND :end_scn \
         AND (OPERATION_CODE IN (6, 7, 36) OR ({}))",
        table_predicate(&filter.tables, "SEG_OWNER", "TABLE_NAME")
    );
    if filter.con_id.is_some() {
        sql.push_str(" AND SRC_CON_ID = :con_id");
    }
    sql
}

/// Reads the whole window. Rows come in mining order, continuation rows adjacent.
pub fn contents(
    connection: &Connection,
    window: ScnWindow,
    filter: &ContentFilter,
) -> Result<Vec<LogMinerContent>, DbError> {
    let sql = contents_sql(filter);
    let result_set = match filter.con_id {
        Some(con_id) => {
            debug!("{}, {}, {}", sql, window, con_id);
            connection.query_as_named::<LogMinerContent>(
                &sql,
                &[
                    ("start_scn", &window.start),
                    ("end_scn", &window.end),
                    ("con_id", &con_id),
                ],
            )?
        }
        None => {
            debug!("{}, {}", sql, window);
            connection.query_as_named::<LogMinerContent>(
                &sql,
                &[("start_scn", &window.start), ("end_scn", &window.end)],
            )?
        }
    };
    result_set
        .map(|content| content.map_err(Into::into))
        .collect()
}

pub fn end(connection: &Connection) -> Result<(), DbError> {
    let sql = "BEGIN DBMS_LOGMNR.END_LOGMNR; END;";
    debug!("{}", sql);
    connection.execute(sql, &[])?;
    Ok(())
}

impl RowValue for LogMinerContent {
    fn get(row: &oracle::Row) -> oracle::Result<Self> {
        let (scn, xid, pxid, operation_code, seg_owner, table_name, sql_redo, csf) = <(
            Scn,
            Vec<u8>,
            Vec<u8>,
            u8,
            Option<String>,
            Option<String>,
            Option<String>,
            u8,
        ) as RowValue>::get(row)?;
        Ok(LogMinerContent {
            scn,
            xid,
            pxid,
            operation_code,
            seg_owner,
            table_name,
            sql_redo,
            csf,
        })
    }
}
