use std::sync::Arc;

use logminer_types::{
    log::{trace, warn},
    types::{CdcRecord, Schema, TableId},
};

use crate::errors::DecodeError;

use super::{
    aggregate::{OperationKind, RawOperation},
    map::{map_row, overlay_row, unlogged_columns},
};

/// Column name and literal, `None` for SQL `NULL`, in statement order.
pub type ParsedRow<'a> = Vec<(&'a str, Option<&'a str>)>;

/// Decodes the redo SQL of committed operations into records.
#[derive(Debug, Clone)]
pub struct Decoder {
    insert: insert::Parser,
    update: update::Parser,
    delete: delete::Parser,
}

impl Decoder {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            insert: insert::Parser::new()?,
            update: update::Parser::new()?,
            delete: delete::Parser::new()?,
        })
    }

    /// Fails for this operation only. Callers skip the row and carry on.
    pub fn decode(
        &self,
        operation: &RawOperation,
        schema: &Arc<Schema>,
    ) -> Result<CdcRecord, DecodeError> {
        trace!(target: "logminer_redo_decoder", "Decoding operation on table {} at SCN {}", operation.table, operation.scn);

        let sql_redo = operation.sql_redo.trim();
        match operation.kind {
            OperationKind::Insert => {
                let after = self.insert.parse(sql_redo, &operation.table)?;
                Ok(
                    CdcRecord::insert(map_row(schema, &after)?, schema.clone())
                        .with_unlogged_columns(unlogged_columns(schema, &after)),
                )
            }
            OperationKind::Delete => {
                let before = self.delete.parse(sql_redo, &operation.table)?;
                Ok(
                    CdcRecord::delete(map_row(schema, &before)?, schema.clone())
                        .with_unlogged_columns(unlogged_columns(schema, &before)),
                )
            }
            OperationKind::Update => {
                let (set, condition) = self.update.parse(sql_redo, &operation.table)?;
                let before = map_row(schema, &condition)?;
                let after = overlay_row(schema, before.clone(), &set)?;
                // The before image only has what the where clause logged.
                Ok(CdcRecord::update(before, after, schema.clone())
                    .with_unlogged_columns(unlogged_columns(schema, &condition)))
            }
        }
    }
}

fn check_table(owner: &str, table_name: &str, table: &TableId) {
    if owner != table.owner() || table_name != table.name() {
        warn!(
            "Table name {}.{} doesn't match {} in log content",
            owner, table_name, table
        );
    }
}

mod delete;
mod insert;
mod row;
mod update;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use logminer_types::{
        rust_decimal::Decimal,
        types::{Field, FieldDefinition, FieldType, Operation},
    };

    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema {
            table: TableId::new("SIT", "TEST_TAB"),
            fields: vec![
                FieldDefinition::new("ID".to_string(), FieldType::Int, false),
                FieldDefinition::new("STRING".to_string(), FieldType::String, true),
                FieldDefinition::new(
                    "BIG_DECIMAL".to_string(),
                    FieldType::Decimal {
                        precision: None,
                        scale: 17,
                    },
                    true,
                ),
            ],
            primary_index: vec![0],
        })
    }

    fn operation(kind: OperationKind, sql_redo: &str) -> RawOperation {
        RawOperation {
            table: TableId::new("SIT", "TEST_TAB"),
            kind,
            scn: 100,
            sql_redo: sql_redo.to_string(),
            mined_index: 0,
        }
    }

    #[test]
    fn test_decode_insert() {
        let decoder = Decoder::new().unwrap();
        let schema = schema();
        let record = decoder
            .decode(
                &operation(
                    OperationKind::Insert,
                    "insert into \"SIT\".\"TEST_TAB\"\n values\n    \"ID\" = 1,\n    \"STRING\" = 'one',\n    \"BIG_DECIMAL\" = 30.516658782958984;",
                ),
                &schema,
            )
            .unwrap();
        assert_eq!(record.operation(), Operation::Insert);
        assert!(record.before().is_none());
        assert!(record.is_complete());
        let after = record.after().unwrap();
        assert!(schema.conforms(after));
        assert_eq!(after["ID"], Field::Int(1));
        let decimal = after["BIG_DECIMAL"].as_decimal().unwrap();
        assert_eq!(decimal.scale(), 17);
        assert_eq!(
            decimal.normalize(),
            Decimal::from_str("30.516658782958984").unwrap()
        );
    }

    #[test]
    fn test_decode_update_keeps_unchanged_columns() {
        let decoder = Decoder::new().unwrap();
        let record = decoder
            .decode(
                &operation(
                    OperationKind::Update,
                    "update \"SIT\".\"TEST_TAB\"\n  set\n    \"STRING\" = 'three'\n  where\n    \"ID\" = 3 and\n    \"STRING\" = 'drei' and\n    \"BIG_DECIMAL\" IS NULL;",
                ),
                &schema(),
            )
            .unwrap();
        assert_eq!(record.operation(), Operation::Update);
        let before = record.before().unwrap();
        let after = record.after().unwrap();
        assert_eq!(before["ID"], Field::Int(3));
        assert_eq!(after["ID"], Field::Int(3));
        assert_eq!(before["STRING"], Field::String("drei".to_string()));
        assert_eq!(after["STRING"], Field::String("three".to_string()));
        assert_eq!(after["BIG_DECIMAL"], Field::Null);
        assert!(record.is_complete());
    }

    #[test]
    fn test_decode_marks_unlogged_columns() {
        let decoder = Decoder::new().unwrap();
        let schema = schema();
        let record = decoder
            .decode(
                &operation(
                    OperationKind::Insert,
                    "insert into \"SIT\".\"TEST_TAB\"\n values\n    \"STRING\" = 'one';",
                ),
                &schema,
            )
            .unwrap();
        assert_eq!(
            record.unlogged_columns(),
            &["ID".to_string(), "BIG_DECIMAL".to_string()]
        );
        // The placeholder of a non-nullable column breaks conformance.
        let after = record.after().unwrap();
        assert_eq!(after["ID"], Field::Null);
        assert!(!schema.conforms(after));

        let record = decoder
            .decode(
                &operation(
                    OperationKind::Update,
                    "update \"SIT\".\"TEST_TAB\"\n  set\n    \"STRING\" = 'three'\n  where\n    \"ID\" = 3;",
                ),
                &schema,
            )
            .unwrap();
        assert_eq!(
            record.unlogged_columns(),
            &["STRING".to_string(), "BIG_DECIMAL".to_string()]
        );
        assert_eq!(record.before().unwrap()["STRING"], Field::Null);
        assert_eq!(
            record.after().unwrap()["STRING"],
            Field::String("three".to_string())
        );
    }

    #[test]
    fn test_decode_delete() {
        let decoder = Decoder::new().unwrap();
        let record = decoder
            .decode(
                &operation(
                    OperationKind::Delete,
                    "delete from \"SIT\".\"TEST_TAB\"\n where\n    \"ID\" = 2 and\n    \"STRING\" = 'two' and\n    \"BIG_DECIMAL\" = 1.5;",
                ),
                &schema(),
            )
            .unwrap();
        assert_eq!(record.operation(), Operation::Delete);
        assert!(record.after().is_none());
        assert_eq!(record.before().unwrap()["ID"], Field::Int(2));
    }

    #[test]
    fn test_decode_errors() {
        let decoder = Decoder::new().unwrap();
        let schema = schema();
        assert!(matches!(
            decoder.decode(&operation(OperationKind::Insert, ""), &schema),
            Err(DecodeError::StatementMismatch { kind: "insert", .. })
        ));
        assert!(matches!(
            decoder.decode(
                &operation(
                    OperationKind::Insert,
                    "insert into \"SIT\".\"TEST_TAB\"\n values\n    \"ID\" = 1,\n    \"NEW_COLUMN\" = 2;"
                ),
                &schema
            ),
            Err(DecodeError::UnknownColumn { .. })
        ));
        assert!(matches!(
            decoder.decode(
                &operation(
                    OperationKind::Insert,
                    "insert into \"SIT\".\"TEST_TAB\"\n values\n    \"ID\" = NULL;"
                ),
                &schema
            ),
            Err(DecodeError::NullValue(_))
        ));
    }
}
