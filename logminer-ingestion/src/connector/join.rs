use std::collections::{HashMap, HashSet};

use logminer_types::types::TableId;

/// A catalog column, as the type mapper sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: Option<String>,
    pub nullable: Option<String>,
    pub is_primary_key: bool,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
}

/// Groups `columns` by table, keeping their order, and flags primary key columns.
pub fn group_by_table(
    columns: Vec<(TableId, Column)>,
    primary_key_columns: &HashSet<(TableId, String)>,
) -> HashMap<TableId, Vec<Column>> {
    let mut tables = HashMap::<TableId, Vec<Column>>::new();
    for (table, mut column) in columns {
        column.is_primary_key = primary_key_columns.contains(&(table.clone(), column.name.clone()));
        tables.entry(table).or_default().push(column);
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table_name: &str, name: &str) -> (TableId, Column) {
        (
            TableId::new("SIT", table_name),
            Column {
                name: name.to_string(),
                data_type: Some("NUMBER".to_string()),
                nullable: Some("N".to_string()),
                is_primary_key: false,
                precision: Some(10),
                scale: Some(0),
            },
        )
    }

    #[test]
    fn test_group_marks_primary_key_columns() {
        let columns = vec![
            column("TEST_TAB", "ID"),
            column("TEST_TAB", "VALUE"),
            column("SECOND_TAB", "ID"),
        ];
        let primary_key_columns =
            HashSet::from([(TableId::new("SIT", "TEST_TAB"), "ID".to_string())]);

        let grouped = group_by_table(columns, &primary_key_columns);
        let test_tab = &grouped[&TableId::new("SIT", "TEST_TAB")];
        assert_eq!(
            test_tab
                .iter()
                .map(|column| (column.name.as_str(), column.is_primary_key))
                .collect::<Vec<_>>(),
            vec![("ID", true), ("VALUE", false)]
        );
        assert!(!grouped[&TableId::new("SIT", "SECOND_TAB")][0].is_primary_key);
    }
}
