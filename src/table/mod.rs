// src/table/mod.rs

//! In-memory tables: one per worksheet, ordered rows, named columns.

pub mod read;

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;
use std::fmt;

pub use read::{read_workbook, read_workbook_from_bytes};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Serial date-time: days since 1899-12-30, time of day as the fraction.
    DateTime(f64),
    /// Elapsed time in days.
    Duration(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) | Cell::Bool(_) | Cell::DateTime(_) | Cell::Duration(_) => false,
        }
    }

    /// Text handed to a lookup adapter, or `None` for blank cells.
    ///
    /// Whole numbers are rendered without a trailing `.0` so that numeric
    /// song titles ("1989") survive as typed.
    pub fn as_input(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            other => Some(other.to_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// `2022-08-01`, or `2022-08-01 12:00:00` when there is a time of day.
fn format_serial_date(serial: f64) -> String {
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|epoch| epoch.checked_add_signed(TimeDelta::milliseconds(millis)));
    match dt {
        Some(dt) if serial.fract() == 0.0 => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format_number(serial),
    }
}

/// `h:mm:ss`, hours unbounded.
fn format_serial_duration(days: f64) -> String {
    let secs = (days * 86_400.0).round() as i64;
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.abs();
    format!("{}{}:{:02}:{:02}", sign, secs / 3600, secs % 3600 / 60, secs % 60)
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Bool(true) => f.write_str("TRUE"),
            Cell::Bool(false) => f.write_str("FALSE"),
            Cell::DateTime(serial) => f.write_str(&format_serial_date(*serial)),
            Cell::Duration(days) => f.write_str(&format_serial_duration(*days)),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<u64> for Cell {
    fn from(n: u64) -> Self {
        Cell::Number(n as f64)
    }
}

/// Rows of cells under a header. Row order and column order are preserved
/// exactly as loaded; new columns are appended on the right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, padding with empty cells (or truncating) to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *slot = value;
        }
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Cell>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Create `name` as an all-empty column, or blank it if it already exists.
    /// Returns the column index.
    pub fn reset_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(col) => {
                for row in &mut self.rows {
                    row[col] = Cell::Empty;
                }
                col
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Empty);
                }
                self.columns.len() - 1
            }
        }
    }
}

/// Named sheets in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<(String, Table)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet, replacing any existing sheet of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = table,
            None => self.sheets.push((name, table)),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.sheets
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn sheets(&self) -> &[(String, Table)] {
        &self.sheets
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist() -> Table {
        let mut t = Table::new(["Song", "Album"]);
        t.push_row(vec!["Kesariya".into(), "Brahmastra".into()]);
        t.push_row(vec![Cell::Number(1989.0), Cell::Empty]);
        t
    }

    #[test]
    fn push_row_pads_to_header_width() {
        let mut t = Table::new(["a", "b", "c"]);
        t.push_row(vec!["x".into()]);
        assert_eq!(t.rows()[0], vec![Cell::from("x"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn reset_column_appends_new_column() {
        let mut t = playlist();
        let col = t.reset_column("Links");
        assert_eq!(col, 2);
        assert_eq!(t.columns(), &["Song", "Album", "Links"]);
        assert!(t.rows().iter().all(|r| r[2] == Cell::Empty));
    }

    #[test]
    fn reset_column_blanks_existing_column_in_place() {
        let mut t = playlist();
        let col = t.reset_column("Song");
        assert_eq!(col, 0);
        assert_eq!(t.columns().len(), 2);
        assert_eq!(t.cell(0, "Song"), Some(&Cell::Empty));
        assert_eq!(t.cell(0, "Album"), Some(&Cell::from("Brahmastra")));
    }

    #[test]
    fn numeric_inputs_render_without_fraction() {
        let t = playlist();
        assert_eq!(t.cell(1, "Song").and_then(Cell::as_input), Some("1989".into()));
        assert_eq!(t.cell(1, "Album").and_then(Cell::as_input), None);
        assert_eq!(Cell::Number(2.5).as_input(), Some("2.5".into()));
        assert_eq!(Cell::from("   ").as_input(), None);
    }

    #[test]
    fn dates_and_booleans_render_as_typed() {
        assert_eq!(Cell::DateTime(44774.0).to_string(), "2022-08-01");
        assert_eq!(Cell::DateTime(44774.5).to_string(), "2022-08-01 12:00:00");
        assert_eq!(Cell::Duration(1.5).to_string(), "36:00:00");
        assert_eq!(Cell::Bool(true).as_input(), Some("TRUE".into()));
        assert!(!Cell::Bool(false).is_empty());
    }

    #[test]
    fn workbook_insert_replaces_same_name() {
        let mut wb = Workbook::new();
        wb.insert("A", playlist());
        wb.insert("B", Table::new(["x"]));
        wb.insert("A", Table::new(["y"]));
        assert_eq!(wb.sheet_names(), vec!["A", "B"]);
        assert_eq!(wb.sheet("A").map(|t| t.columns().to_vec()), Some(vec!["y".to_string()]));
    }
}
