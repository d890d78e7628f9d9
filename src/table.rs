use std::fs;
use std::mem::take;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Row/column table shared by fetched dynamic events and uploaded files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// First line is the header. Rows shorter than the header are padded with
    /// empty cells (trailing empties are often dropped by exporters); longer
    /// rows are rejected.
    pub fn from_delimited(text: &str) -> Result<Self, FetchError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let sep = sniff_separator(text);
        let mut rows = parse_rows(text, sep);
        if rows.is_empty() {
            return Err(FetchError::InvalidTable("no header row".to_string()));
        }
        let columns: Vec<String> = rows
            .remove(0)
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(FetchError::InvalidTable("empty header row".to_string()));
        }

        for (idx, row) in rows.iter_mut().enumerate() {
            if row.len() > columns.len() {
                return Err(FetchError::InvalidTable(format!(
                    "row {} has {} fields, header has {}",
                    idx + 2,
                    row.len(),
                    columns.len()
                )));
            }
            row.resize(columns.len(), String::new());
        }

        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }
}

/// Reads a user-supplied delimited file. The cached tables are never touched here.
pub fn load_upload(path: &Path) -> Result<Table> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let table = Table::from_delimited(&raw)
        .with_context(|| format!("failed parsing {}", path.display()))?;
    Ok(table)
}

/// Picks the most frequent of `,` `;` `\t` on the header line (comma on ties).
pub fn sniff_separator(text: &str) -> char {
    let header = text.lines().next().unwrap_or_default();
    let mut best = (',', header.matches(',').count());
    for sep in [';', '\t'] {
        let count = header.matches(sep).count();
        if count > best.1 {
            best = (sep, count);
        }
    }
    best.0
}

/// Quote- and CRLF-tolerant delimited-text parser.
pub fn parse_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => {
                row.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // Unterminated quotes still flush the trailing row.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::{Table, parse_rows, sniff_separator};

    #[test]
    fn quoted_separators_and_escapes() {
        let rows = parse_rows("a,b\n\"x,1\",\"say \"\"hi\"\"\"\n", ',');
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["x,1".to_string(), "say \"hi\"".to_string()]);
    }

    #[test]
    fn crlf_and_blank_lines() {
        let rows = parse_rows("a,b\r\n\r\n1,2\r\n", ',');
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn sniffs_semicolon_and_tab() {
        assert_eq!(sniff_separator("a;b;c\n1;2;3"), ';');
        assert_eq!(sniff_separator("a\tb\n1\t2"), '\t');
        assert_eq!(sniff_separator("single"), ',');
    }

    #[test]
    fn short_rows_are_padded() {
        let table = Table::from_delimited("event_id,frame,player\n1,10\n").expect("parse");
        assert_eq!(table.rows[0], vec!["1", "10", ""]);
        assert_eq!(table.cell(0, "frame"), Some("10"));
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = Table::from_delimited("a,b\n1,2,3\n").expect_err("too many fields");
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(Table::from_delimited("").is_err());
        assert!(Table::from_delimited("\u{feff}").is_err());
    }
}
