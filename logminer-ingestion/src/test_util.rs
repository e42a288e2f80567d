use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
};

use logminer_types::{
    models::config::{LogminerConfig, RetryConfig, StartPosition, WindowConfig},
    offset::Scn,
    types::{Field, Schema, TableId},
};

use crate::{
    connector::{
        join::Column,
        replicate::log::{LogMinerContent, LogType, OperationType, RedoLog},
        ContentFilter, DbError, LogMinerConnection, SnapshotRow,
    },
    window::ScnWindow,
};

pub fn test_table() -> TableId {
    TableId::new("SIT", "TEST_TAB")
}

/// No backoff, small windows.
pub fn test_config(start: StartPosition) -> LogminerConfig {
    LogminerConfig {
        start,
        window: WindowConfig {
            default_size: 10,
            min_size: 10,
            max_size: 40,
            high_water_rows: 1000,
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        poll_batch_size: 100,
        decode_error_threshold: 0,
        continuous_mine: false,
        con_id: None,
    }
}

fn column(
    name: &str,
    data_type: &str,
    nullable: bool,
    is_primary_key: bool,
    precision: Option<i64>,
    scale: Option<i64>,
) -> Column {
    Column {
        name: name.to_string(),
        data_type: Some(data_type.to_string()),
        nullable: Some(if nullable { "Y" } else { "N" }.to_string()),
        is_primary_key,
        precision,
        scale,
    }
}

/// Calls `FakeConnection` can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    PrepareSession,
    CurrentScn,
    ActiveTransactions,
    ListLogs,
    StartLogMiner,
    Contents,
    EndLogMiner,
    DescribeTables,
    Snapshot,
}

/// An in-memory database with a single redo stream.
///
/// Contents must be pushed in SCN order.
pub struct FakeConnection {
    current_scn: Cell<Scn>,
    tables: RefCell<HashMap<TableId, Vec<Column>>>,
    contents: RefCell<Vec<LogMinerContent>>,
    logs: RefCell<Vec<RedoLog>>,
    snapshot_rows: RefCell<HashMap<TableId, Vec<(String, Vec<Field>)>>>,
    failures: RefCell<HashMap<Call, VecDeque<DbError>>>,
    calls: RefCell<HashMap<Call, usize>>,
    started: Cell<Option<ScnWindow>>,
    mined_windows: RefCell<Vec<ScnWindow>>,
}

impl FakeConnection {
    pub fn new(current_scn: Scn) -> Self {
        Self {
            current_scn: Cell::new(current_scn),
            tables: Default::default(),
            contents: Default::default(),
            logs: RefCell::new(vec![RedoLog {
                name: "/u01/redo01.log".to_string(),
                sequence: 1,
                first_change: 0,
                next_change: Scn::MAX,
                log_type: LogType::Online,
            }]),
            snapshot_rows: Default::default(),
            failures: Default::default(),
            calls: Default::default(),
            started: Cell::new(None),
            mined_windows: Default::default(),
        }
    }

    /// Adds `table` with the columns of `SIT.TEST_TAB`.
    pub fn add_table(&self, table: &TableId) {
        let columns = vec![
            column("ID", "NUMBER", false, true, Some(10), Some(0)),
            column("TIME", "TIMESTAMP(6)", true, false, None, Some(6)),
            column("STRING", "VARCHAR2", true, false, None, None),
            column("integer", "NUMBER", true, false, Some(10), Some(0)),
            column("long", "NUMBER", true, false, Some(19), Some(0)),
            column("date", "DATE", true, false, None, None),
            column("BIG_DECIMAL", "NUMBER", true, false, Some(28), Some(17)),
        ];
        self.tables.borrow_mut().insert(table.clone(), columns);
    }

    pub fn add_column(
        &self,
        table: &TableId,
        name: &str,
        data_type: &str,
        precision: Option<i64>,
        scale: Option<i64>,
    ) {
        self.tables
            .borrow_mut()
            .entry(table.clone())
            .or_default()
            .push(column(name, data_type, true, false, precision, scale));
    }

    pub fn set_current_scn(&self, scn: Scn) {
        self.current_scn.set(scn);
    }

    pub fn set_logs(&self, logs: Vec<RedoLog>) {
        *self.logs.borrow_mut() = logs;
    }

    /// Makes the next call of `call` fail with `error`. Queued failures are used up in order.
    pub fn fail(&self, call: Call, error: DbError) {
        self.failures
            .borrow_mut()
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Windows LogMiner was started for, in order.
    pub fn mined_windows(&self) -> Vec<ScnWindow> {
        self.mined_windows.borrow().clone()
    }

    pub fn calls(&self, call: Call) -> usize {
        self.calls.borrow().get(&call).copied().unwrap_or_default()
    }

    pub fn add_snapshot_row(&self, table: &TableId, rowid: &str, values: Vec<Field>) {
        let mut rows = self.snapshot_rows.borrow_mut();
        let rows = rows.entry(table.clone()).or_default();
        rows.push((rowid.to_string(), values));
        rows.sort_by(|a, b| a.0.cmp(&b.0));
    }

    pub fn push(&self, content: LogMinerContent) {
        self.contents.borrow_mut().push(content);
    }

    fn push_control(&self, scn: Scn, xid: u8, operation_code: u8) {
        self.push(LogMinerContent {
            scn,
            xid: vec![xid],
            pxid: vec![xid],
            operation_code,
            seg_owner: None,
            table_name: None,
            sql_redo: None,
            csf: 0,
        });
    }

    pub fn push_dml(&self, scn: Scn, xid: u8, table: &TableId, operation_code: u8, sql_redo: String) {
        self.push(LogMinerContent {
            scn,
            xid: vec![xid],
            pxid: vec![xid],
            operation_code,
            seg_owner: Some(table.owner().to_string()),
            table_name: Some(table.name().to_string()),
            sql_redo: Some(sql_redo),
            csf: 0,
        });
    }

    pub fn push_insert(&self, scn: Scn, xid: u8, table: &TableId, id: i64) {
        self.push_dml(scn, xid, table, 1, insert_sql(table, id));
    }

    pub fn push_update(&self, scn: Scn, xid: u8, table: &TableId, id: i64, string: &str) {
        self.push_dml(scn, xid, table, 3, update_sql(table, id, string));
    }

    pub fn push_delete(&self, scn: Scn, xid: u8, table: &TableId, id: i64) {
        self.push_dml(scn, xid, table, 2, delete_sql(table, id));
    }

    pub fn push_ddl(&self, scn: Scn, xid: u8, table: &TableId, sql_redo: &str) {
        self.push_dml(scn, xid, table, 5, sql_redo.to_string());
    }

    pub fn push_commit(&self, scn: Scn, xid: u8) {
        self.push_control(scn, xid, 7);
    }

    pub fn push_rollback(&self, scn: Scn, xid: u8) {
        self.push_control(scn, xid, 36);
    }

    fn call(&self, call: Call) -> Result<(), DbError> {
        *self.calls.borrow_mut().entry(call).or_default() += 1;
        match self
            .failures
            .borrow_mut()
            .get_mut(&call)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn insert_sql(table: &TableId, id: i64) -> String {
    format!(
        "insert into \"{}\".\"{}\"\n values\n    \"ID\" = {id},\n    \"TIME\" = TO_TIMESTAMP('2024-03-01 10:11:12.123456000'),\n    \"STRING\" = 'row {id}',\n    \"integer\" = {id},\n    \"long\" = {},\n    \"date\" = TO_DATE('2024-03-01 00:00:00', 'YYYY-MM-DD HH24:MI:SS'),\n    \"BIG_DECIMAL\" = 30.516658782958984;",
        table.owner(),
        table.name(),
        id * 1000
    )
}

pub fn update_sql(table: &TableId, id: i64, string: &str) -> String {
    format!(
        "update \"{}\".\"{}\"\n  set\n    \"STRING\" = '{string}'\n  where\n    \"ID\" = {id} and\n    \"STRING\" = 'row {id}';",
        table.owner(),
        table.name()
    )
}

pub fn delete_sql(table: &TableId, id: i64) -> String {
    format!(
        "delete from \"{}\".\"{}\"\n where\n    \"ID\" = {id} and\n    \"STRING\" = 'row {id}' and\n    \"integer\" = {id};",
        table.owner(),
        table.name()
    )
}

impl LogMinerConnection for FakeConnection {
    fn prepare_session(&self) -> Result<(), DbError> {
        self.call(Call::PrepareSession)
    }

    fn current_scn(&self) -> Result<Scn, DbError> {
        self.call(Call::CurrentScn)?;
        Ok(self.current_scn.get())
    }

    /// Transactions with rows at or before the current SCN and no commit or rollback yet.
    fn oldest_active_transaction_scn(&self) -> Result<Option<Scn>, DbError> {
        self.call(Call::ActiveTransactions)?;
        let current_scn = self.current_scn.get();
        let mut active = HashMap::new();
        for content in self
            .contents
            .borrow()
            .iter()
            .filter(|content| content.scn <= current_scn)
        {
            match content.operation_type() {
                OperationType::Commit | OperationType::Rollback => {
                    active.remove(&content.xid);
                }
                _ => {
                    active.entry(content.xid.clone()).or_insert(content.scn);
                }
            }
        }
        Ok(active.into_values().min())
    }

    fn list_logs(&self, window: ScnWindow) -> Result<Vec<RedoLog>, DbError> {
        self.call(Call::ListLogs)?;
        Ok(self
            .logs
            .borrow()
            .iter()
            .filter(|log| log.next_change > window.start && log.first_change <= window.end)
            .cloned()
            .collect())
    }

    fn start_log_miner(
        &self,
        window: ScnWindow,
        _logs: &[RedoLog],
        _continuous_mine: bool,
    ) -> Result<(), DbError> {
        self.call(Call::StartLogMiner)?;
        self.started.set(Some(window));
        self.mined_windows.borrow_mut().push(window);
        Ok(())
    }

    fn contents(
        &self,
        window: ScnWindow,
        filter: &ContentFilter,
    ) -> Result<Vec<LogMinerContent>, DbError> {
        self.call(Call::Contents)?;
        if self.started.get() != Some(window) {
            return Err(DbError::new(Some(1306), "dbms_logmnr.start_logmnr() must be invoked"));
        }
        Ok(self
            .contents
            .borrow()
            .iter()
            .filter(|content| window.contains(content.scn))
            .filter(|content| {
                filter.is_monitored(content)
                    || matches!(
                        content.operation_type(),
                        OperationType::Start | OperationType::Commit | OperationType::Rollback
                    )
            })
            .cloned()
            .collect())
    }

    fn end_log_miner(&self) -> Result<(), DbError> {
        self.call(Call::EndLogMiner)?;
        self.started.set(None);
        Ok(())
    }

    fn describe_tables(
        &self,
        tables: &[TableId],
    ) -> Result<HashMap<TableId, Vec<Column>>, DbError> {
        self.call(Call::DescribeTables)?;
        let known = self.tables.borrow();
        Ok(tables
            .iter()
            .filter_map(|table| {
                known
                    .get(table)
                    .map(|columns| (table.clone(), columns.clone()))
            })
            .collect())
    }

    fn snapshot(
        &self,
        schema: &Schema,
        _scn: Scn,
        after_rowid: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SnapshotRow>, DbError> {
        self.call(Call::Snapshot)?;
        let rows = self.snapshot_rows.borrow();
        Ok(rows
            .get(&schema.table)
            .map(|rows| {
                rows.iter()
                    .filter(|(rowid, _)| after_rowid.map_or(true, |after| rowid.as_str() > after))
                    .take(limit)
                    .map(|(rowid, values)| SnapshotRow {
                        rowid: rowid.clone(),
                        values: Ok(values.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
