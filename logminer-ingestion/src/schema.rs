use std::{collections::HashMap, sync::Arc};

use logminer_types::{
    log::{info, warn},
    offset::Scn,
    types::{Schema, TableId},
};

use crate::{
    connector::{mapping::decide_schema, LogMinerConnection},
    errors::SchemaError,
};

/// Decides what a DDL statement on a monitored table means for its schema.
pub trait SchemaChangeDetector {
    /// Returns true if the schema of `table` must be derived again.
    fn on_ddl(&mut self, table: &TableId, scn: Scn, sql_redo: Option<&str>) -> bool;
}

/// Logs DDL and keeps the current schemas. Rows that no longer match show up as decode errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreDdl;

impl SchemaChangeDetector for IgnoreDdl {
    fn on_ddl(&mut self, table: &TableId, scn: Scn, sql_redo: Option<&str>) -> bool {
        warn!(
            "Ignoring DDL on {} at SCN {}: {}",
            table,
            scn,
            sql_redo.unwrap_or_default()
        );
        false
    }
}

/// Re-derives the schema of a table after any DDL on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOnDdl;

impl SchemaChangeDetector for RefreshOnDdl {
    fn on_ddl(&mut self, table: &TableId, scn: Scn, _sql_redo: Option<&str>) -> bool {
        info!("Refreshing schema of {} after DDL at SCN {}", table, scn);
        true
    }
}

/// The current schema of every monitored table.
///
/// Refreshing replaces a table's `Arc<Schema>`. Records decoded before keep the old one.
#[derive(Debug, Clone, Default)]
pub struct Schemas {
    schemas: HashMap<TableId, Arc<Schema>>,
}

impl Schemas {
    pub fn load<C: LogMinerConnection + ?Sized>(
        connection: &C,
        tables: &[TableId],
    ) -> Result<Self, SchemaError> {
        let mut schemas = Self::default();
        schemas.refresh(connection, tables)?;
        Ok(schemas)
    }

    /// Derives the schemas of `tables` again. Nothing changes if any of them fails.
    pub fn refresh<C: LogMinerConnection + ?Sized>(
        &mut self,
        connection: &C,
        tables: &[TableId],
    ) -> Result<(), SchemaError> {
        let mut columns = connection.describe_tables(tables)?;
        let mut refreshed = Vec::with_capacity(tables.len());
        for table in tables {
            let table_columns = columns
                .remove(table)
                .ok_or_else(|| SchemaError::TableNotFound(table.clone()))?;
            let schema =
                decide_schema(table, table_columns).map_err(|source| SchemaError::DataType {
                    table: table.clone(),
                    source,
                })?;
            refreshed.push((table.clone(), Arc::new(schema)));
        }
        self.schemas.extend(refreshed);
        Ok(())
    }

    pub fn get(&self, table: &TableId) -> Option<&Arc<Schema>> {
        self.schemas.get(table)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
