//! Row sources: spreadsheets and CSV files read into a header + rows table.
//!
//! Every cell is read as text. Numeric cells that hold whole numbers are
//! rendered without a fractional part so a code typed as `123` in a
//! spreadsheet does not come back as `123.0`.

use crate::error::CourierError;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

/// Header row plus data rows, all cells as trimmed strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from literal values. Used by tests and callers that
    /// already hold rows in memory.
    pub fn from_rows<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(|h| h.into().trim().to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|c| c.into().trim().to_string()).collect())
                .collect(),
        }
    }

    /// Read `path`. `.csv` goes through the CSV reader, everything else
    /// through the workbook reader, using `sheet` or the first sheet.
    ///
    /// Rows whose cells are all empty are dropped.
    pub fn read(path: &Path, sheet: Option<&str>) -> Result<Self, CourierError> {
        if !path.exists() {
            return Err(CourierError::LocalPathMissing {
                path: path.to_path_buf(),
            });
        }
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let mut table = if is_csv {
            read_csv(path)?
        } else {
            read_workbook(path, sheet)?
        };
        table.rows.retain(|r| r.iter().any(|c| !c.is_empty()));
        info!(
            "Read {} row(s) with columns [{}] from {}",
            table.rows.len(),
            table.headers.join(", "),
            path.display()
        );
        Ok(table)
    }

    /// Index of the column named `name` (trimmed, case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.headers.iter().position(|h| h.to_lowercase() == wanted)
    }

    /// Like [`Table::column_index`] but a missing column is fatal.
    pub fn require_column(&self, name: &str) -> Result<usize, CourierError> {
        self.column_index(name)
            .ok_or_else(|| CourierError::MissingColumn {
                column: name.to_string(),
                available: self.headers.join(", "),
            })
    }

    /// Cell `col` of `row`; missing cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn unreadable(path: &Path, detail: impl ToString) -> CourierError {
    CourierError::RowSourceUnreadable {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn read_csv(path: &Path) -> Result<Table, CourierError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| unreadable(path, e))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| unreadable(path, e))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(Table { headers, rows })
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Table, CourierError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(path, e))?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.trim().eq_ignore_ascii_case(wanted.trim()))
            .cloned()
            .ok_or_else(|| CourierError::SheetNotFound {
                sheet: wanted.to_string(),
                available: names.join(", "),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| unreadable(path, "workbook has no sheets"))?,
    };
    debug!("Reading sheet '{name}'");

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| unreadable(path, e))?;
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|r| r.iter().map(cell_text).collect()).collect();
    Ok(Table { headers, rows })
}

/// Render one workbook cell as text.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Keep only ASCII digits. Certificate numbers are compared this way
/// regardless of spacing or punctuation in the source.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}
