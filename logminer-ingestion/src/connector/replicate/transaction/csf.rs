//! Rows with the continuation flag (`CSF = 1`) in V$LOGMNR_CONTENTS.

use fxhash::FxHashMap;
use logminer_types::log::warn;

use crate::connector::replicate::log::{LogMinerContent, TransactionId};

/// Joins the pieces of long statements, so that every returned row has `csf == 0`.
///
/// Pieces are collected per transaction. A statement whose last piece is missing is dropped.
pub fn merge_continuations(
    contents: impl IntoIterator<Item = LogMinerContent>,
) -> Vec<LogMinerContent> {
    let mut merged = vec![];
    let mut partial = FxHashMap::<TransactionId, LogMinerContent>::default();
    for content in contents {
        let content = match partial.remove(&content.xid) {
            Some(mut head) => {
                if let Some(piece) = content.sql_redo {
                    head.sql_redo.get_or_insert_with(String::new).push_str(&piece);
                }
                head.csf = content.csf;
                head
            }
            None => content,
        };
        if content.csf == 0 {
            merged.push(content);
        } else {
            partial.insert(content.xid.clone(), content);
        }
    }

    if !partial.is_empty() {
        warn!(
            "Dropping {} statements without their final continuation row",
            partial.len()
        );
    }
    merged
}
