use logminer_types::types::TableId;
use regex::Regex;

use crate::errors::DecodeError;

use super::{check_table, row, ParsedRow};

#[derive(Debug, Clone)]
pub struct Parser {
    regex: Regex,
    row_parser: row::Parser,
}

impl Parser {
    pub fn new() -> Result<Self, regex::Error> {
        let regex = Regex::new(r#"^insert into "([^"]+)"\."([^"]+)"\s+values\s+(?s:(.*))$"#)?;
        Ok(Self {
            regex,
            row_parser: row::Parser::new(","),
        })
    }

    pub fn parse<'a>(&self, sql_redo: &'a str, table: &TableId) -> Result<ParsedRow<'a>, DecodeError> {
        let captures = self
            .regex
            .captures(sql_redo)
            .ok_or_else(|| DecodeError::StatementMismatch {
                kind: "insert",
                sql_redo: sql_redo.to_string(),
            })?;
        check_table(&captures[1], &captures[2], table);
        let values = captures.get(3).map_or("", |values| values.as_str());
        self.row_parser.parse(values)
    }
}

#[test]
fn test_parse() {
    let parser = Parser::new().unwrap();
    let sql_redo = r#"insert into "SIT"."TEST_TAB"
 values
    "ID" = 1,
    "TIME" = TO_TIMESTAMP('2024-03-01 10:11:12.123456000'),
    "STRING" = 'it''s',
    "integer" = 42,
    "long" = NULL,
    "BIG_DECIMAL" = 30.516658782958984;"#;
    let parsed = parser
        .parse(sql_redo, &TableId::new("SIT", "TEST_TAB"))
        .unwrap();
    assert_eq!(parsed.len(), 6);
    assert_eq!(parsed[2], ("STRING", Some("'it''s'")));
    assert_eq!(parsed[4], ("long", None));
    assert_eq!(parsed[5], ("BIG_DECIMAL", Some("30.516658782958984")));

    assert!(matches!(
        parser.parse("delete from \"SIT\".\"TEST_TAB\"", &TableId::new("SIT", "TEST_TAB")),
        Err(DecodeError::StatementMismatch { kind: "insert", .. })
    ));
}
