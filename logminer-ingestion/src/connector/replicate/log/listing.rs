use logminer_types::{log::debug, offset::Scn};
use oracle::{
    sql_type::{FromSql, OracleType, ToSql},
    Connection, RowValue,
};

use crate::{connector::DbError, errors::SessionStartError, window::ScnWindow};

use super::{LogType, RedoLog};

impl FromSql for LogType {
    fn from_sql(val: &oracle::SqlValue) -> oracle::Result<Self>
    where
        Self: Sized,
    {
        let v: u8 = val.get()?;
        Ok(if v == LogType::Archived as u8 {
            LogType::Archived
        } else {
            LogType::Online
        })
    }
}

impl ToSql for LogType {
    fn oratype(&self, _conn: &Connection) -> oracle::Result<oracle::sql_type::OracleType> {
        Ok(OracleType::Number(1, 0))
    }

    fn to_sql(&self, val: &mut oracle::SqlValue) -> oracle::Result<()> {
        val.set(&(*self as u8))
    }
}

impl RowValue for RedoLog {
    fn get(row: &oracle::Row) -> oracle::Result<Self> {
        let (name, first_change, next_change, log_type, sequence) =
            <(String, Scn, Scn, LogType, u32) as RowValue>::get(row)?;
        Ok(RedoLog {
            name,
            sequence,
            first_change,
            next_change,
            log_type,
        })
    }
}

const LIST_LOGS_SQL: &str = r#"
        select
            MIN(F.MEMBER)       as NAME,
            LOG.FIRST_CHANGE#   as FIRST_CHANGE,
            LOG.NEXT_CHANGE#    as NEXT_CHANGE,
            :online_type        as LOG_TYPE,
            LOG.SEQUENCE#       as SEQUENCE
        from
            V$LOG LOG
        inner join V$LOGFILE F
            on LOG.GROUP# = F.GROUP#
        where
            LOG.STATUS != 'UNUSED'
            and
            LOG.NEXT_CHANGE# > :online_start_scn
            and
            LOG.FIRST_CHANGE# <= :online_end_scn
        group by
            LOG.GROUP#, LOG.FIRST_CHANGE#, LOG.NEXT_CHANGE#, LOG.SEQUENCE#
        union all
        select
            NAME            as NAME,
            FIRST_CHANGE#   as FIRST_CHANGE,
            NEXT_CHANGE#    as NEXT_CHANGE,
            :archive_type   as LOG_TYPE,
            SEQUENCE#       as SEQUENCE
        from
            V$ARCHIVED_LOG
        where
            NAME is not null
            and
            STATUS = 'A'
            and
            DELETED = 'NO'
            and
            NEXT_CHANGE# > :archive_start_scn
            and
            FIRST_CHANGE# <= :archive_end_scn
        order by SEQUENCE
        "#;

/// Online and archived logs overlapping `window`, one per sequence.
pub fn list(connection: &Connection, window: ScnWindow) -> Result<Vec<RedoLog>, DbError> {
    debug!("{}, {}", LIST_LOGS_SQL, window);
    let mut stmt = connection.statement(LIST_LOGS_SQL).build()?;
    stmt.bind("online_type", &LogType::Online)?;
    stmt.bind("online_start_scn", &window.start)?;
    stmt.bind("online_end_scn", &window.end)?;
    stmt.bind("archive_type", &LogType::Archived)?;
    stmt.bind("archive_start_scn", &window.start)?;
    stmt.bind("archive_end_scn", &window.end)?;
    let logs = stmt
        .query_as::<RedoLog>(&[])?
        .map(|log| log.map_err(Into::into))
        .collect::<Result<Vec<_>, DbError>>()?;
    connection.commit()?;
    Ok(dedup_by_sequence(logs))
}

/// An online log that has been archived shows up twice. The archived copy is kept because the
/// online group may be reused at any moment.
pub fn dedup_by_sequence(logs: Vec<RedoLog>) -> Vec<RedoLog> {
    let (mut archived, online) = logs
        .into_iter()
        .partition::<Vec<_>, _>(|log| log.log_type == LogType::Archived);
    archived.sort_by_key(|log| log.sequence);
    archived.dedup_by_key(|log| log.sequence);
    for online_log in online {
        if archived
            .binary_search_by_key(&online_log.sequence, |log| log.sequence)
            .is_err()
        {
            archived.push(online_log);
        }
    }
    archived.sort_by_key(|log| log.sequence);
    archived
}

/// Checks that `logs` hold every SCN from `start` on without holes.
pub fn check_coverage(logs: &[RedoLog], start: Scn) -> Result<(), SessionStartError> {
    let Some(first) = logs.first() else {
        return Err(SessionStartError::LogGap {
            scn: start,
            oldest: None,
        });
    };
    if first.first_change > start {
        return Err(SessionStartError::LogGap {
            scn: start,
            oldest: Some(first.first_change),
        });
    }
    for pair in logs.windows(2) {
        if pair[1].first_change != pair[0].next_change {
            return Err(SessionStartError::LogGap {
                scn: pair[0].next_change,
                oldest: Some(first.first_change),
            });
        }
    }
    Ok(())
}
