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
        let regex = Regex::new(r#"^delete from "([^"]+)"\."([^"]+)"\s+where\s+(?s:(.*))$"#)?;
        Ok(Self {
            regex,
            row_parser: row::Parser::new(" and"),
        })
    }

    pub fn parse<'a>(&self, sql_redo: &'a str, table: &TableId) -> Result<ParsedRow<'a>, DecodeError> {
        let captures = self
            .regex
            .captures(sql_redo)
            .ok_or_else(|| DecodeError::StatementMismatch {
                kind: "delete",
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
    let sql_redo = r#"delete from "HR"."EMPLOYEES"
    where
       "EMPLOYEE_ID" = 306 and
       "FIRST_NAME" = 'Nandini' and
       "LAST_NAME" = 'Shastry' and
       "EMAIL" = 'NSHASTRY' and
       "PHONE_NUMBER" = '1234567890' and
       "JOB_ID" = 'HR_REP' and
       "SALARY" = 120000 and
       "COMMISSION_PCT" = .05 and
       "MANAGER_ID" = 105 and
       "DEPARTMENT_ID" IS NULL;
    "#;
    let parsed = parser
        .parse(sql_redo, &TableId::new("HR", "EMPLOYEES"))
        .unwrap();
    assert_eq!(parsed.len(), 10);
    assert_eq!(parsed[7], ("COMMISSION_PCT", Some(".05")));
    assert_eq!(parsed[9], ("DEPARTMENT_ID", None));
}
