// src/table/read.rs

use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::{fs, io::Cursor, path::Path};
use tracing::{debug, info};

use super::{Cell, Table, Workbook};

/// Load every sheet of a spreadsheet file. The first row of each sheet is
/// taken as the header.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let bytes = fs::read(&path)
        .with_context(|| format!("reading workbook {:?}", path.as_ref()))?;
    read_workbook_from_bytes(&bytes)
}

/// Same as [`read_workbook`], for a workbook already held in memory.
pub fn read_workbook_from_bytes(bytes: &[u8]) -> Result<Workbook> {
    let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("opening workbook")?;

    let mut workbook = Workbook::new();
    for name in sheets.sheet_names() {
        let range = sheets
            .worksheet_range(&name)
            .with_context(|| format!("reading sheet '{}'", name))?;
        let table = table_from_range(&range);
        debug!(sheet = %name, columns = table.columns().len(), rows = table.len(), "loaded sheet");
        workbook.insert(name, table);
    }
    info!("Found {} sheet(s): {:?}", workbook.len(), workbook.sheet_names());
    Ok(workbook)
}

fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let columns = header.iter().enumerate().map(|(i, d)| match cell_from_data(d) {
        Cell::Empty => format!("Unnamed: {}", i),
        other => other.to_string(),
    });
    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(cell_from_data).collect());
    }
    table
}

fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Cell::Duration(dt.as_f64()),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        // ISO date strings (OpenDocument) and error values such as `#N/A`
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::assemble;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_headers_and_rows_from_file() -> Result<()> {
        let mut table = Table::new(["Song", "Album", "Plays"]);
        table.push_row(vec!["Tum Hi Ho".into(), "Aashiqui 2".into(), Cell::Number(1200.0)]);
        table.push_row(vec!["Kesariya".into(), Cell::Empty, Cell::Number(7.0)]);

        let bytes = assemble(&[("Playlist", &table)])?;
        let mut file = NamedTempFile::new()?;
        file.write_all(&bytes)?;

        let wb = read_workbook(file.path())?;
        assert_eq!(wb.sheet_names(), vec!["Playlist"]);
        let loaded = wb.sheet("Playlist").expect("sheet present");
        assert_eq!(loaded.columns(), table.columns());
        assert_eq!(loaded.rows(), table.rows());
        Ok(())
    }

    #[test]
    fn rejects_non_spreadsheet_bytes() {
        assert!(read_workbook_from_bytes(b"definitely not a workbook").is_err());
    }
}
