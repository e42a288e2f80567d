use logminer_types::offset::Scn;

pub mod listing;
pub mod redo;

/// Raw `XID`/`PXID` bytes, `USN.SLT.SQN` packed by Oracle.
pub type TransactionId = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// This is a raw row from V$LOGMNR_CONTENTS
pub struct LogMinerContent {
    pub scn: Scn,
    pub xid: TransactionId,
    pub pxid: TransactionId,
    pub operation_code: u8,
    pub seg_owner: Option<String>,
    pub table_name: Option<String>,
    pub sql_redo: Option<String>,
    pub csf: u8,
}

impl LogMinerContent {
    pub fn operation_type(&self) -> OperationType {
        self.operation_code.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Insert,
    Delete,
    Update,
    Ddl,
    Start,
    Commit,
    Rollback,
    Other(u8),
}

impl From<u8> for OperationType {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Insert,
            2 => Self::Delete,
            3 => Self::Update,
            5 => Self::Ddl,
            6 => Self::Start,
            7 => Self::Commit,
            36 => Self::Rollback,
            other => Self::Other(other),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogType {
    Online = 0,
    Archived = 1,
}

/// A redo log file and the SCN range `[first_change, next_change)` it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedoLog {
    pub name: String,
    pub sequence: u32,
    pub first_change: Scn,
    pub next_change: Scn,
    pub log_type: LogType,
}

impl RedoLog {
    pub fn contains(&self, scn: Scn) -> bool {
        self.first_change <= scn && scn < self.next_change
    }
}
