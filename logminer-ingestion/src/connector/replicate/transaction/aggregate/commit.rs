use logminer_types::{log::trace, offset::Scn};

use crate::connector::replicate::log::TransactionId;

use super::{oldest_open_scn, Transaction, TransactionForest};

/// Removes the committed transaction from the forest and returns its operations in mining
/// order.
///
/// Committing a sub transaction whose parent is still open does nothing: its operations become
/// visible with the parent's commit.
pub fn commit(
    xid: TransactionId,
    pxid: TransactionId,
    commit_scn: Scn,
    transaction_forest: &mut TransactionForest,
) -> Option<Transaction> {
    if xid != pxid && transaction_forest.is_open(&pxid) {
        trace!(
            "Sub transaction {:02X?} committed into parent {:02X?}",
            xid,
            pxid
        );
        return None;
    }

    let buffers = transaction_forest.close(&xid)?;
    let first_scn = buffers
        .iter()
        .filter_map(|buffer| buffer.first_scn)
        .min()
        .unwrap_or(commit_scn);
    let mut operations = buffers
        .into_iter()
        .flat_map(|buffer| buffer.operations)
        .collect::<Vec<_>>();
    operations.sort_by_key(|operation| operation.mined_index);

    // Mining again from here sees this transaction and every one still open.
    let restart_scn = oldest_open_scn(transaction_forest)
        .map_or(first_scn, |oldest| oldest.min(first_scn));
    Some(Transaction {
        commit_scn,
        restart_scn,
        operations,
    })
}
