use std::sync::Arc;

use logminer_types::{
    log::{debug, error, info, warn},
    models::config::{LogminerConfig, StartPosition},
    offset::{Offset, Scn},
    types::{CdcRecord, PollResult, Row, TableId},
};

use crate::{
    connector::{
        replicate::{
            log::{listing::check_coverage, LogMinerContent},
            transaction::{AggregateEvent, Decoder, Processor, Transaction},
        },
        ContentFilter, DbError, LogMinerConnection,
    },
    errors::{
        DecodeError, FetchError, LogminerError, SchemaError, SessionStartError, WindowAdvanceError,
    },
    retry::{blocking_retry, RetryError},
    schema::{SchemaChangeDetector, Schemas},
    window::{ScnWindow, WindowAdvancer},
};

/// Windows mined by one `next_batch` call at most, so a poll returns even when a long SCN range
/// holds nothing of interest.
pub const MAX_WINDOWS_PER_POLL: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiningStats {
    pub decode_errors_total: u64,
    pub decode_errors_last_window: usize,
    pub rows_mined: u64,
    pub windows_mined: u64,
    /// The last window had more decode errors than `decode_error_threshold`.
    pub threshold_exceeded: bool,
}

#[derive(Debug, Clone)]
struct SnapshotState {
    scn: Scn,
    table_index: usize,
    after_rowid: Option<String>,
    next_seq: u64,
    /// Rows before this sequence were delivered before a restart.
    resume_seq: u64,
    /// Where mining starts once the snapshot is done.
    stream_start: Scn,
}

#[derive(Debug, Clone)]
struct StreamState {
    advancer: WindowAdvancer,
    processor: Processor,
    /// Rows ordered before this `(commit_scn, seq)` were delivered before a restart.
    resume_from: Option<(Scn, u64)>,
    /// Commit SCN the sequence counter belongs to.
    seq_scn: Scn,
    next_seq: u64,
}

#[derive(Debug, Clone)]
enum Phase {
    Snapshot(SnapshotState),
    Stream(StreamState),
}

/// Owns the mining position of one set of tables over one connection.
pub struct MiningSession<C: LogMinerConnection> {
    connection: Arc<C>,
    config: LogminerConfig,
    tables: Vec<TableId>,
    filter: ContentFilter,
    schemas: Schemas,
    decoder: Decoder,
    phase: Phase,
    stats: MiningStats,
}

enum MiningFailure {
    Advance(DbError),
    Fetch(DbError),
}

impl MiningFailure {
    fn db_error(&self) -> &DbError {
        match self {
            MiningFailure::Advance(error) | MiningFailure::Fetch(error) => error,
        }
    }
}

impl std::fmt::Display for MiningFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiningFailure::Advance(error) => write!(f, "starting LogMiner: {error}"),
            MiningFailure::Fetch(error) => write!(f, "reading LogMiner contents: {error}"),
        }
    }
}

fn start_error(scn: Scn, error: RetryError<DbError>) -> SessionStartError {
    match error {
        RetryError::Fatal(source) if source.is_log_unavailable() => {
            SessionStartError::LogUnavailable { scn, source }
        }
        RetryError::Fatal(source) => SessionStartError::Database(source),
        RetryError::Exhausted { attempts, error } => SessionStartError::RetriesExhausted {
            attempts,
            source: error,
        },
    }
}

fn is_retryable(error: &DbError) -> bool {
    !error.is_log_unavailable()
}

impl<C: LogMinerConnection> MiningSession<C> {
    /// Starts mining at `last_offset`, or where `config.start` says when there is none.
    pub fn start_or_resume(
        connection: Arc<C>,
        config: LogminerConfig,
        tables: Vec<TableId>,
        last_offset: Option<Offset>,
    ) -> Result<Self, SessionStartError> {
        let retry = config.retry;
        let requested_scn = last_offset.map_or(0, |offset| offset.restart_scn);

        blocking_retry("session preparation", &retry, DbError::is_transient, || {
            connection.prepare_session()
        })
        .map_err(|e| start_error(requested_scn, e))?;

        let schemas = blocking_retry(
            "schema derivation",
            &retry,
            |e: &SchemaError| matches!(e, SchemaError::Database(e) if e.is_transient()),
            || Schemas::load(connection.as_ref(), &tables),
        )
        .map_err(|e| match e {
            RetryError::Fatal(error) | RetryError::Exhausted { error, .. } => {
                SessionStartError::Schema(error)
            }
        })?;

        let decoder = Decoder::new().map_err(SessionStartError::Parser)?;
        let filter = ContentFilter {
            tables: tables.clone(),
            con_id: config.con_id,
        };

        let current_scn = || {
            blocking_retry("reading current SCN", &retry, DbError::is_transient, || {
                connection.current_scn()
            })
            .map_err(|e| start_error(requested_scn, e))
        };
        // Returns a start SCN and the SCN mining must start at to see every transaction still
        // open at it. A transaction that isn't active when the active ones are listed started
        // after the first SCN read.
        let start_scns = || -> Result<(Scn, Scn), SessionStartError> {
            let listed_at = current_scn()?;
            let oldest_active = blocking_retry(
                "reading active transactions",
                &retry,
                DbError::is_transient,
                || connection.oldest_active_transaction_scn(),
            )
            .map_err(|e| start_error(requested_scn, e))?;
            let scn = current_scn()?;
            let mining_start = oldest_active.map_or(listed_at, |oldest| oldest.min(listed_at));
            Ok((scn, mining_start))
        };
        let phase = match last_offset {
            Some(offset) if offset.is_snapshot() => {
                info!("Resuming snapshot at {}", offset);
                Phase::Snapshot(SnapshotState::new(
                    offset.scn,
                    offset.seq,
                    offset.restart_scn,
                ))
            }
            Some(offset) => {
                info!("Resuming log mining at {}", offset);
                Phase::Stream(StreamState::new(
                    &config,
                    &tables,
                    offset.restart_scn,
                    Some((offset.scn, offset.seq)),
                ))
            }
            None => match config.start {
                StartPosition::Now => {
                    let (scn, mining_start) = start_scns()?;
                    info!(
                        "Starting log mining at current SCN {}, mining from SCN {}",
                        scn, mining_start
                    );
                    // Transactions committed before `scn` are in the past.
                    Phase::Stream(StreamState::new(
                        &config,
                        &tables,
                        mining_start,
                        Some((scn, 0)),
                    ))
                }
                StartPosition::Scn(scn) => {
                    info!("Starting log mining at SCN {}", scn);
                    Phase::Stream(StreamState::new(&config, &tables, scn, None))
                }
                StartPosition::Snapshot => {
                    let (scn, stream_start) = start_scns()?;
                    info!(
                        "Starting snapshot at SCN {}, mining from SCN {} afterwards",
                        scn, stream_start
                    );
                    Phase::Snapshot(SnapshotState::new(scn, 0, stream_start))
                }
            },
        };

        if let Phase::Stream(state) = &phase {
            if !config.continuous_mine {
                let start = state.advancer.next_start();
                let logs = blocking_retry(
                    "listing redo logs",
                    &retry,
                    DbError::is_transient,
                    || connection.list_logs(ScnWindow::new(start, start)),
                )
                .map_err(|e| start_error(start, e))?;
                check_coverage(&logs, start)?;
            }
        }

        Ok(Self {
            connection,
            config,
            tables,
            filter,
            schemas,
            decoder,
            phase,
            stats: MiningStats::default(),
        })
    }

    pub fn stop(self) {
        info!(
            "Stopping mining session for {} tables after {} windows",
            self.tables.len(),
            self.stats.windows_mined
        );
    }

    pub fn stats(&self) -> &MiningStats {
        &self.stats
    }

    pub fn is_snapshotting(&self) -> bool {
        matches!(self.phase, Phase::Snapshot(_))
    }

    /// Highest SCN all changes up to which have been handed out. `None` until a window completes.
    ///
    /// Stays below the first SCN of any transaction still open.
    pub fn low_water_mark(&self) -> Option<Scn> {
        match &self.phase {
            Phase::Snapshot(_) => None,
            Phase::Stream(state) => state.advancer.low_water_mark(),
        }
    }

    pub fn schemas(&self) -> &Schemas {
        &self.schemas
    }

    pub fn refresh_schemas(&mut self, tables: &[TableId]) -> Result<(), SchemaError> {
        self.schemas.refresh(self.connection.as_ref(), tables)
    }

    /// Reads the next records, at most `limit` while snapshotting.
    ///
    /// Nothing changes on error, so calling again retries the same rows.
    pub fn next_batch(
        &mut self,
        limit: usize,
        detector: &mut dyn SchemaChangeDetector,
    ) -> Result<Vec<PollResult>, LogminerError> {
        if let Phase::Snapshot(state) = &self.phase {
            let state = state.clone();
            let results = self.snapshot_batch(state, limit)?;
            if !results.is_empty() || self.is_snapshotting() {
                return Ok(results);
            }
        }
        self.stream_batch(detector)
    }

    fn snapshot_batch(
        &mut self,
        mut state: SnapshotState,
        limit: usize,
    ) -> Result<Vec<PollResult>, LogminerError> {
        let limit = limit.max(1);
        let mut stats = self.stats.clone();
        let mut results = vec![];
        while results.len() < limit {
            let Some(table) = self.tables.get(state.table_index) else {
                info!(
                    "Snapshot at SCN {} complete, mining from SCN {}",
                    state.scn, state.stream_start
                );
                self.stats = stats;
                // Transactions committed at or before the snapshot SCN are in the snapshot.
                self.phase = Phase::Stream(StreamState::new(
                    &self.config,
                    &self.tables,
                    state.stream_start,
                    Some((state.scn + 1, 0)),
                ));
                return Ok(results);
            };
            let schema = self
                .schemas
                .get(table)
                .cloned()
                .ok_or_else(|| LogminerError::SchemaRefresh(SchemaError::TableNotFound(table.clone())))?;

            let requested = limit - results.len();
            let rows = blocking_retry(
                format!("snapshot of {} at SCN {}", table, state.scn),
                &self.config.retry,
                is_retryable,
                || {
                    self.connection.snapshot(
                        &schema,
                        state.scn,
                        state.after_rowid.as_deref(),
                        requested,
                    )
                },
            )
            .map_err(|e| match e {
                RetryError::Fatal(source) => LogminerError::SessionStart(
                    SessionStartError::LogUnavailable {
                        scn: state.scn,
                        source,
                    },
                ),
                RetryError::Exhausted { attempts, error } => LogminerError::Fetch(FetchError {
                    start: state.scn,
                    end: state.scn,
                    attempts,
                    source: error,
                }),
            })?;

            let fetched = rows.len();
            for row in rows {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.after_rowid = Some(row.rowid);
                if seq < state.resume_seq {
                    continue;
                }
                match row.values {
                    Ok(values) => {
                        let after: Row = schema
                            .fields
                            .iter()
                            .map(|field| field.name.clone())
                            .zip(values)
                            .collect();
                        results.push(PollResult {
                            cdc_record: CdcRecord::read(after, schema.clone()),
                            offset: Offset::snapshot(state.scn, seq)
                                .with_restart_scn(state.stream_start),
                        });
                    }
                    Err(e) => {
                        warn!("Skipping snapshot row of {}: {}", table, e);
                        stats.decode_errors_total += 1;
                    }
                }
            }
            stats.rows_mined += fetched as u64;

            if fetched < requested {
                debug!("Finished snapshot of {}", table);
                state.table_index += 1;
                state.after_rowid = None;
            }
        }
        self.stats = stats;
        self.phase = Phase::Snapshot(state);
        Ok(results)
    }

    fn stream_batch(
        &mut self,
        detector: &mut dyn SchemaChangeDetector,
    ) -> Result<Vec<PollResult>, LogminerError> {
        let Phase::Stream(state) = &self.phase else {
            return Ok(vec![]);
        };
        let mut state = state.clone();
        let mut schemas = self.schemas.clone();
        let mut stats = self.stats.clone();
        let mut results = vec![];

        for _ in 0..MAX_WINDOWS_PER_POLL {
            let next_start = state.advancer.next_start();
            let current_scn = blocking_retry(
                "reading current SCN",
                &self.config.retry,
                is_retryable,
                || self.connection.current_scn(),
            )
            .map_err(|e| advance_error(ScnWindow::new(next_start, next_start), e))?;
            let Some(window) = state.advancer.next_window(current_scn) else {
                break;
            };

            let contents = self.mine_window(window)?;
            let rows = contents.len();
            // Transaction control of every other table is mined too.
            let monitored_rows = contents
                .iter()
                .filter(|content| self.filter.is_monitored(content))
                .count();
            let mut decode_errors = 0;
            for event in state.processor.process(contents) {
                match event {
                    AggregateEvent::Ddl {
                        table,
                        scn,
                        sql_redo,
                    } => {
                        if detector.on_ddl(&table, scn, sql_redo.as_deref()) {
                            if let Err(e) =
                                schemas.refresh(self.connection.as_ref(), &[table.clone()])
                            {
                                warn!("Keeping schema of {} after failed refresh: {}", table, e);
                            }
                        }
                    }
                    AggregateEvent::Commit(transaction) => {
                        decode_errors += decode_transaction(
                            &self.decoder,
                            &schemas,
                            &mut state,
                            transaction,
                            &mut results,
                        );
                    }
                }
            }
            state.advancer.complete(
                window,
                monitored_rows,
                state.processor.oldest_open_scn(),
            );

            stats.windows_mined += 1;
            stats.rows_mined += rows as u64;
            stats.decode_errors_total += decode_errors as u64;
            stats.decode_errors_last_window = decode_errors;
            stats.threshold_exceeded = decode_errors > self.config.decode_error_threshold;
            if stats.threshold_exceeded {
                warn!(
                    "{} rows of window {} failed to decode, threshold is {}",
                    decode_errors, window, self.config.decode_error_threshold
                );
            }
            debug!(
                "Mined window {}: {} rows, {} of monitored tables, {} records, {} open transactions",
                window,
                rows,
                monitored_rows,
                results.len(),
                state.processor.open_transactions()
            );

            if !results.is_empty() || state.advancer.is_caught_up(current_scn) {
                break;
            }
        }

        self.phase = Phase::Stream(state);
        self.schemas = schemas;
        self.stats = stats;
        Ok(results)
    }

    fn mine_window(&self, window: ScnWindow) -> Result<Vec<LogMinerContent>, LogminerError> {
        let retry = &self.config.retry;
        let continuous_mine = self.config.continuous_mine;

        let logs = if continuous_mine {
            vec![]
        } else {
            let logs = blocking_retry(
                format!("listing redo logs for window {window}"),
                retry,
                is_retryable,
                || self.connection.list_logs(window),
            )
            .map_err(|e| advance_error(window, e))?;
            check_coverage(&logs, window.start)?;
            logs
        };

        blocking_retry(
            format!("mining window {window}"),
            retry,
            |e: &MiningFailure| is_retryable(e.db_error()),
            || {
                self.connection
                    .start_log_miner(window, &logs, continuous_mine)
                    .map_err(MiningFailure::Advance)?;
                let contents = self
                    .connection
                    .contents(window, &self.filter)
                    .map_err(MiningFailure::Fetch);
                if let Err(e) = self.connection.end_log_miner() {
                    error!("Failed to end log miner: {}", e);
                }
                contents
            },
        )
        .map_err(|e| match e {
            RetryError::Fatal(failure) => {
                LogminerError::SessionStart(SessionStartError::LogUnavailable {
                    scn: window.start,
                    source: failure.db_error().clone(),
                })
            }
            RetryError::Exhausted {
                attempts,
                error: MiningFailure::Advance(source),
            } => LogminerError::WindowAdvance(WindowAdvanceError::RetriesExhausted {
                start: window.start,
                end: window.end,
                attempts,
                source,
            }),
            RetryError::Exhausted {
                attempts,
                error: MiningFailure::Fetch(source),
            } => LogminerError::Fetch(FetchError {
                start: window.start,
                end: window.end,
                attempts,
                source,
            }),
        })
    }
}

fn advance_error(window: ScnWindow, error: RetryError<DbError>) -> LogminerError {
    match error {
        RetryError::Fatal(source) => {
            LogminerError::SessionStart(SessionStartError::LogUnavailable {
                scn: window.start,
                source,
            })
        }
        RetryError::Exhausted { attempts, error } => {
            LogminerError::WindowAdvance(WindowAdvanceError::RetriesExhausted {
                start: window.start,
                end: window.end,
                attempts,
                source: error,
            })
        }
    }
}

/// Decodes the rows of a committed transaction into `results`. Returns the number of rows that
/// failed to decode.
fn decode_transaction(
    decoder: &Decoder,
    schemas: &Schemas,
    state: &mut StreamState,
    transaction: Transaction,
    results: &mut Vec<PollResult>,
) -> usize {
    if transaction.commit_scn != state.seq_scn {
        state.seq_scn = transaction.commit_scn;
        state.next_seq = 0;
    }

    let mut decode_errors = 0;
    for operation in transaction.operations {
        let seq = state.next_seq;
        state.next_seq += 1;
        if state
            .resume_from
            .map_or(false, |resume_from| (transaction.commit_scn, seq) < resume_from)
        {
            continue;
        }

        let decoded = schemas
            .get(&operation.table)
            .ok_or_else(|| DecodeError::UnknownTable(operation.table.clone()))
            .and_then(|schema| decoder.decode(&operation, schema));
        match decoded {
            Ok(cdc_record) => results.push(PollResult {
                cdc_record,
                offset: Offset::stream(transaction.commit_scn, seq, transaction.restart_scn),
            }),
            Err(e) => {
                warn!(
                    "Skipping row of {} committed at SCN {}: {}",
                    operation.table, transaction.commit_scn, e
                );
                decode_errors += 1;
            }
        }
    }
    decode_errors
}

impl SnapshotState {
    fn new(scn: Scn, resume_seq: u64, stream_start: Scn) -> Self {
        Self {
            scn,
            table_index: 0,
            after_rowid: None,
            next_seq: 0,
            resume_seq,
            stream_start: stream_start.min(scn + 1),
        }
    }
}

impl StreamState {
    fn new(
        config: &LogminerConfig,
        tables: &[TableId],
        start: Scn,
        resume_from: Option<(Scn, u64)>,
    ) -> Self {
        Self {
            advancer: WindowAdvancer::new(config.window, start),
            processor: Processor::new(tables),
            resume_from,
            seq_scn: 0,
            next_seq: 0,
        }
    }
}
