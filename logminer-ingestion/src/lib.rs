use std::{collections::VecDeque, sync::Arc};

use logminer_types::{
    log::info,
    models::config::LogminerConfig,
    offset::{Offset, Scn},
    types::{PollResult, TableId},
};

pub use connector::{DbError, LogMinerConnection};
pub use errors::{LogminerError, SessionStartError};
pub use schema::{IgnoreDdl, RefreshOnDdl, SchemaChangeDetector};
pub use session::{MiningSession, MiningStats};

/// Change records of a set of tables, read from the redo log on the caller's thread.
///
/// The caller drives it: `maybe_start_query` whenever a session may be needed, `poll` on its own
/// schedule.
pub struct LogminerSource<C: LogMinerConnection> {
    config: LogminerConfig,
    tables: Vec<TableId>,
    initial_offset: Option<Offset>,
    last_offset: Option<Offset>,
    session: Option<MiningSession<C>>,
    buffer: VecDeque<PollResult>,
    detector: Box<dyn SchemaChangeDetector>,
}

impl<C: LogMinerConnection> LogminerSource<C> {
    /// `last_offset` is the offset of the last record the caller persisted, if any.
    pub fn new(config: LogminerConfig, tables: Vec<TableId>, last_offset: Option<Offset>) -> Self {
        Self {
            config,
            tables,
            initial_offset: last_offset,
            last_offset: None,
            session: None,
            buffer: VecDeque::new(),
            detector: Box::new(IgnoreDdl),
        }
    }

    pub fn with_schema_change_detector(mut self, detector: Box<dyn SchemaChangeDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Starts a session at the last delivered offset unless one is running.
    pub fn maybe_start_query(&mut self, connection: Arc<C>) -> Result<(), LogminerError> {
        if self.session.is_some() {
            return Ok(());
        }

        // Buffered records are mined again from the resume point.
        self.buffer.clear();
        let resume_offset = self.last_offset.or(self.initial_offset);
        info!(
            "Starting mining session for {} tables from {}",
            self.tables.len(),
            resume_offset.map_or("the configured start".to_string(), |offset| offset
                .to_string())
        );
        let session = MiningSession::start_or_resume(
            connection,
            self.config.clone(),
            self.tables.clone(),
            resume_offset,
        )?;
        self.session = Some(session);
        Ok(())
    }

    /// Returns the next records in offset order, an empty batch if nothing new is committed.
    pub fn poll(&mut self) -> Result<Vec<PollResult>, LogminerError> {
        let session = self.session.as_mut().ok_or(LogminerError::NotStarted)?;
        let batch_size = self.config.poll_batch_size.max(1);

        if self.buffer.is_empty() {
            let batch = session.next_batch(batch_size, self.detector.as_mut())?;
            self.buffer.extend(batch);
        }

        let count = batch_size.min(self.buffer.len());
        let results = self.buffer.drain(..count).collect::<Vec<_>>();
        if let Some(last) = results.last() {
            self.last_offset = Some(last.offset);
        }
        Ok(results)
    }

    /// Ends the session. Undelivered records are dropped and mined again by the next session.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        self.buffer.clear();
    }

    pub fn refresh_schemas(&mut self, tables: &[TableId]) -> Result<(), LogminerError> {
        let session = self.session.as_mut().ok_or(LogminerError::NotStarted)?;
        session
            .refresh_schemas(tables)
            .map_err(LogminerError::SchemaRefresh)
    }

    /// Offset of the last record returned by `poll`.
    pub fn last_offset(&self) -> Option<Offset> {
        self.last_offset
    }

    /// See `MiningSession::low_water_mark`.
    pub fn low_water_mark(&self) -> Option<Scn> {
        self.session.as_ref().and_then(MiningSession::low_water_mark)
    }

    pub fn stats(&self) -> Option<&MiningStats> {
        self.session.as_ref().map(MiningSession::stats)
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }
}

pub mod connector;
pub mod errors;
pub mod retry;
pub mod schema;
pub mod session;
pub mod window;

#[cfg(test)]
mod test_util;
#[cfg(test)]
mod tests;
