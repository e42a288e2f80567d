use std::sync::Arc;

use logminer_types::{
    models::config::{LogminerConfig, StartPosition},
    offset::Offset,
    types::{Operation, PollResult},
};

use crate::{
    test_util::{test_config, test_table, FakeConnection},
    LogminerSource,
};

pub fn connection(current_scn: u64) -> Arc<FakeConnection> {
    let connection = FakeConnection::new(current_scn);
    connection.add_table(&test_table());
    Arc::new(connection)
}

pub fn started_source(
    connection: &Arc<FakeConnection>,
    config: LogminerConfig,
    last_offset: Option<Offset>,
) -> LogminerSource<FakeConnection> {
    let mut source = LogminerSource::new(config, vec![test_table()], last_offset);
    source.maybe_start_query(connection.clone()).unwrap();
    source
}

/// Source mining from the current SCN of `connection`.
pub fn streaming_source(connection: &Arc<FakeConnection>) -> LogminerSource<FakeConnection> {
    started_source(connection, test_config(StartPosition::Now), None)
}

/// Polls until a poll returns nothing.
pub fn poll_all(source: &mut LogminerSource<FakeConnection>) -> Vec<PollResult> {
    let mut all = vec![];
    loop {
        let results = source.poll().unwrap();
        if results.is_empty() {
            return all;
        }
        all.extend(results);
    }
}

pub fn ids(results: &[PollResult]) -> Vec<i64> {
    results
        .iter()
        .map(|result| {
            let record = &result.cdc_record;
            let row = match record.operation() {
                Operation::Delete => record.before(),
                _ => record.after(),
            };
            row.and_then(|row| row["ID"].as_int()).unwrap()
        })
        .collect()
}

pub fn assert_offsets_non_decreasing(results: &[PollResult]) {
    for pair in results.windows(2) {
        assert!(
            pair[0].offset <= pair[1].offset,
            "{} after {}",
            pair[1].offset,
            pair[0].offset
        );
    }
}
