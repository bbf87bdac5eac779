//! CSV tokenizer, parser and serializer for user-supplied roster files.
//!
//! Parsing is a single left-to-right scan with one character of lookahead.
//! Quoted fields may carry commas, doubled quotes and line breaks. The first
//! retained row is the header; later rows become [`CsvRow`]s keyed by it.
//! Columns with a blank header are dropped.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::CsvError;

/// One data row: header/cell pairs in source column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvRow {
    cells: Vec<(String, String)>,
}

impl CsvRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell, replacing the value if `header` is already present.
    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<String>) {
        let header = header.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(h, _)| *h == header) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((header, value)),
        }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<H: Into<String>, V: Into<String>> FromIterator<(H, V)> for CsvRow {
    fn from_iter<I: IntoIterator<Item = (H, V)>>(iter: I) -> Self {
        let mut row = CsvRow::new();
        for (header, value) in iter {
            row.insert(header, value);
        }
        row
    }
}

// Serialized as a JSON object in column order, ready for a request body.
impl Serialize for CsvRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (header, value) in &self.cells {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

/// Parsed file: trimmed headers plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// Parse `text` into header-keyed rows.
pub fn parse(text: &str) -> Result<Vec<CsvRow>, CsvError> {
    parse_table(text).map(|table| table.rows)
}

/// Parse `text`, keeping the header row alongside the data rows.
pub fn parse_table(text: &str) -> Result<CsvTable, CsvError> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut records = tokenize(text).into_iter();

    let header_record = records.next().ok_or(CsvError::EmptyInput)?;
    let width = header_record.len();
    // Blank header cells, e.g. trailing commas from a spreadsheet export, drop
    // their column.
    let columns: Vec<(usize, String)> = header_record
        .iter()
        .enumerate()
        .map(|(column, cell)| (column, cell.trim().to_string()))
        .filter(|(_, header)| !header.is_empty())
        .collect();
    for (index, (_, header)) in columns.iter().enumerate() {
        if columns[..index].iter().any(|(_, seen)| seen == header) {
            return Err(CsvError::DuplicateHeader(header.clone()));
        }
    }

    let rows = records
        .enumerate()
        .map(|(index, record)| {
            if record.len() > width {
                roster_logging::roster_debug!(
                    "csv row {} has {} cells for {} columns; extra cells ignored",
                    index + 1,
                    record.len(),
                    width
                );
            }
            columns
                .iter()
                .map(|(column, header)| {
                    let value = record.get(*column).map(|cell| cell.trim()).unwrap_or("");
                    (header.clone(), value.to_string())
                })
                .collect::<CsvRow>()
        })
        // Only ignored cells held data.
        .filter(|row| row.iter().any(|(_, value)| !value.is_empty()))
        .collect();

    let headers = columns.into_iter().map(|(_, header)| header).collect();
    Ok(CsvTable { headers, rows })
}

// Splits text into records of raw cells, dropping all-blank records.
fn tokenize(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut value = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                value.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => current_row.push(std::mem::take(&mut value)),
            '\r' | '\n' if !in_quotes => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                current_row.push(std::mem::take(&mut value));
                push_record(&mut records, std::mem::take(&mut current_row));
            }
            _ => value.push(c),
        }
    }

    if !value.is_empty() || !current_row.is_empty() {
        current_row.push(value);
        push_record(&mut records, current_row);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().all(|cell| cell.trim().is_empty()) {
        return;
    }
    records.push(record);
}

/// Render `rows` as CSV text under `headers`, one `\n`-terminated line each.
///
/// Cells missing from a row are written empty. Cells containing a comma,
/// quote or line break are quoted with embedded quotes doubled.
pub fn to_csv_string(headers: &[String], rows: &[CsvRow]) -> String {
    let mut out = String::new();
    write_record(&mut out, headers.iter().map(String::as_str));
    for row in rows {
        write_record(
            &mut out,
            headers.iter().map(|header| row.get(header).unwrap_or("")),
        );
    }
    out
}

fn write_record<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (index, cell) in cells.enumerate() {
        if index > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\r', '\n']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}
