use logminer_types::{offset::Scn, types::TableId};

use super::log::LogMinerContent;

pub use aggregate::{AggregateEvent, OperationKind, RawOperation, Transaction};
pub use parse::Decoder;

/// Turns the rows of consecutive windows into committed transactions and DDL events.
#[derive(Debug, Clone)]
pub struct Processor {
    aggregator: aggregate::Aggregator,
}

impl Processor {
    pub fn new(tables: &[TableId]) -> Self {
        Self {
            aggregator: aggregate::Aggregator::new(tables),
        }
    }

    pub fn process(
        &mut self,
        contents: impl IntoIterator<Item = LogMinerContent>,
    ) -> Vec<AggregateEvent> {
        self.aggregator
            .process(csf::merge_continuations(contents))
    }

    pub fn oldest_open_scn(&self) -> Option<Scn> {
        self.aggregator.oldest_open_scn()
    }

    pub fn open_transactions(&self) -> usize {
        self.aggregator.open_transactions()
    }
}

mod aggregate;
mod csf;
mod map;
mod parse;
