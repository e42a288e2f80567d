use fxhash::FxHashSet;
use logminer_types::{
    log::{trace, warn},
    offset::Scn,
    types::TableId,
};

use crate::connector::replicate::log::{LogMinerContent, OperationType, TransactionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub commit_scn: Scn,
    /// Where mining must restart to see this transaction and every one still open after it.
    pub restart_scn: Scn,
    pub operations: Vec<RawOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOperation {
    pub table: TableId,
    pub kind: OperationKind,
    pub scn: Scn,
    pub sql_redo: String,
    /// Position in the mined stream, used to order operations of sub transactions.
    pub mined_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Delete,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateEvent {
    Commit(Transaction),
    /// DDL on a monitored table. DDL is auto committed, so it is reported where it is mined.
    Ddl {
        table: TableId,
        scn: Scn,
        sql_redo: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TxBuffer {
    /// SCN of the first buffered operation.
    first_scn: Option<Scn>,
    operations: Vec<RawOperation>,
}

type TransactionForest = forest::Forest<TransactionId, TxBuffer>;

/// Buffers DML per transaction and releases it on commit.
///
/// State carries over between windows, so a transaction may start in one window and commit in a
/// later one.
#[derive(Debug, Clone)]
pub struct Aggregator {
    tables: FxHashSet<TableId>,
    transaction_forest: TransactionForest,
    mined: u64,
}

impl Aggregator {
    pub fn new<'a>(tables: impl IntoIterator<Item = &'a TableId>) -> Self {
        Self {
            tables: tables.into_iter().cloned().collect(),
            transaction_forest: Default::default(),
            mined: 0,
        }
    }

    /// First SCN of the oldest open transaction.
    pub fn oldest_open_scn(&self) -> Option<Scn> {
        oldest_open_scn(&self.transaction_forest)
    }

    pub fn open_transactions(&self) -> usize {
        self.transaction_forest.len()
    }

    pub fn process(
        &mut self,
        iterator: impl IntoIterator<Item = LogMinerContent>,
    ) -> Vec<AggregateEvent> {
        let mut events = vec![];
        for content in iterator {
            if let Some(event) = self.process_content(content) {
                events.push(event);
            }
        }
        events
    }

    fn process_content(&mut self, content: LogMinerContent) -> Option<AggregateEvent> {
        let operation_type = content.operation_type();

        if operation_type == OperationType::Commit {
            return commit::commit(
                content.xid,
                content.pxid,
                content.scn,
                &mut self.transaction_forest,
            )
            .map(AggregateEvent::Commit);
        }

        if operation_type == OperationType::Rollback {
            self.transaction_forest.close(&content.xid);
            return None;
        }

        let (Some(seg_owner), Some(table_name)) = (content.seg_owner, content.table_name) else {
            trace!("Ignoring operation: {:?}", content.sql_redo);
            return None;
        };
        let table = TableId::new(seg_owner, table_name);
        if !self.tables.contains(&table) {
            trace!("Ignoring operation on table {}", table);
            return None;
        }

        let kind = match operation_type {
            OperationType::Insert => OperationKind::Insert,
            OperationType::Delete => OperationKind::Delete,
            OperationType::Update => OperationKind::Update,
            OperationType::Ddl => {
                warn!(
                    "DDL on monitored table {} at SCN {}: {:?}",
                    table, content.scn, content.sql_redo
                );
                return Some(AggregateEvent::Ddl {
                    table,
                    scn: content.scn,
                    sql_redo: content.sql_redo,
                });
            }
            _ => {
                trace!("Ignoring operation: {:?}", content.sql_redo);
                return None;
            }
        };

        let mined_index = self.mined;
        self.mined += 1;
        op::process_operation(
            content.xid,
            content.pxid,
            content.scn,
            RawOperation {
                table,
                kind,
                scn: content.scn,
                // An empty statement fails to decode and is counted there.
                sql_redo: content.sql_redo.unwrap_or_default(),
                mined_index,
            },
            &mut self.transaction_forest,
        );
        None
    }
}

fn oldest_open_scn(transaction_forest: &TransactionForest) -> Option<Scn> {
    transaction_forest
        .values()
        .filter_map(|buffer| buffer.first_scn)
        .min()
}

mod commit;
mod forest;
mod op;
