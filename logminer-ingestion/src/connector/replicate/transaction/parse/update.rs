use logminer_types::types::TableId;
use regex::Regex;

use crate::errors::DecodeError;

use super::{check_table, row, ParsedRow};

#[derive(Debug, Clone)]
pub struct Parser {
    regex: Regex,
    set_parser: row::Parser,
    where_parser: row::Parser,
}

impl Parser {
    pub fn new() -> Result<Self, regex::Error> {
        let regex = Regex::new(
            r#"^update "([^"]+)"\."([^"]+)"\s+set\s+(?s:(.*?))(?:\n\s*where\s+(?s:(.*)))?$"#,
        )?;
        Ok(Self {
            regex,
            set_parser: row::Parser::new(","),
            where_parser: row::Parser::new(" and"),
        })
    }

    /// Returns the `set` and the `where` assignments.
    pub fn parse<'a>(
        &self,
        sql_redo: &'a str,
        table: &TableId,
    ) -> Result<(ParsedRow<'a>, ParsedRow<'a>), DecodeError> {
        let captures = self
            .regex
            .captures(sql_redo)
            .ok_or_else(|| DecodeError::StatementMismatch {
                kind: "update",
                sql_redo: sql_redo.to_string(),
            })?;
        check_table(&captures[1], &captures[2], table);
        let set = captures.get(3).map_or("", |set| set.as_str());
        let condition = captures.get(4).map_or("", |condition| condition.as_str());
        Ok((
            self.set_parser.parse(set)?,
            self.where_parser.parse(condition)?,
        ))
    }
}

#[test]
fn test_parse() {
    let parser = Parser::new().unwrap();
    let sql_redo = r#"update "SIT"."TEST_TAB"
  set
    "STRING" = 'updated',
    "long" = NULL
  where
    "ID" = 3 and
    "STRING" = 'original' and
    "long" = 7;"#;
    let (set, condition) = parser
        .parse(sql_redo, &TableId::new("SIT", "TEST_TAB"))
        .unwrap();
    assert_eq!(set, vec![("STRING", Some("'updated'")), ("long", None)]);
    assert_eq!(
        condition,
        vec![
            ("ID", Some("3")),
            ("STRING", Some("'original'")),
            ("long", Some("7"))
        ]
    );

    let (set, condition) = parser
        .parse(
            "update \"SIT\".\"TEST_TAB\"\n  set\n    \"STRING\" = 'x';",
            &TableId::new("SIT", "TEST_TAB"),
        )
        .unwrap();
    assert_eq!(set, vec![("STRING", Some("'x'"))]);
    assert!(condition.is_empty());
}
