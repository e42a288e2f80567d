use logminer_types::{log::trace, offset::Scn};

use crate::connector::replicate::log::TransactionId;

use super::{RawOperation, TransactionForest};

/// Buffers `operation` in its transaction until the commit.
pub fn process_operation(
    xid: TransactionId,
    pxid: TransactionId,
    scn: Scn,
    operation: RawOperation,
    transaction_forest: &mut TransactionForest,
) {
    if xid != pxid && !transaction_forest.is_open(&pxid) {
        trace!("Sub transaction {:02X?} opens parent {:02X?}", xid, pxid);
    }
    let buffer = transaction_forest.open(xid, pxid);
    buffer.first_scn = Some(buffer.first_scn.map_or(scn, |first| first.min(scn)));
    buffer.operations.push(operation);
}
