use crate::errors::DecodeError;

use super::ParsedRow;

/// Parses the column list of a pretty printed statement, one `"COLUMN" = value` per line.
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    delimiter: &'static str,
}

impl Parser {
    /// `delimiter` ends every assignment but the last, like `,` in `values` and ` and` in
    /// `where`.
    pub fn new(delimiter: &'static str) -> Self {
        Self { delimiter }
    }

    pub fn parse<'a>(&self, values: &'a str) -> Result<ParsedRow<'a>, DecodeError> {
        let mut row = vec![];
        let mut rest = values;
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            let end = line_end(rest);
            let line = &rest[..end];
            rest = &rest[end..];

            let line = line.trim_end();
            let line = line.strip_suffix(';').unwrap_or(line);
            let line = line.strip_suffix(self.delimiter).unwrap_or(line);
            if line.is_empty() || line.starts_with("ROWID") {
                continue;
            }
            row.push(parse_assignment(line)?);
        }
        Ok(row)
    }
}

/// End of the current line, ignoring line breaks inside quoted literals.
fn line_end(s: &str) -> usize {
    let mut in_quote = false;
    for (index, byte) in s.bytes().enumerate() {
        match byte {
            b'\'' => in_quote = !in_quote,
            b'\n' if !in_quote => return index,
            _ => {}
        }
    }
    s.len()
}

fn parse_assignment(line: &str) -> Result<(&str, Option<&str>), DecodeError> {
    let mismatch = || DecodeError::AssignmentMismatch(line.to_string());
    let quoted = line.strip_prefix('"').ok_or_else(mismatch)?;
    let end = memchr::memchr(b'"', quoted.as_bytes()).ok_or_else(mismatch)?;
    let column = &quoted[..end];
    let rest = quoted[end + 1..].trim_start();

    if rest == "IS NULL" {
        return Ok((column, None));
    }
    let value = rest.strip_prefix('=').ok_or_else(mismatch)?.trim();
    if value.is_empty() {
        return Err(mismatch());
    }
    if value == "NULL" {
        return Ok((column, None));
    }
    Ok((column, Some(value)))
}
