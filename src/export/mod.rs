// src/export/mod.rs

//! Serialize enriched tables back into a multi-sheet workbook.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};
use std::{fs, path::Path};
use tracing::info;

use crate::table::{Cell, Table, Workbook};

/// Build an `.xlsx` artifact in memory, one sheet per `(name, table)` pair,
/// in the order given. The header row is written as plain text and cells
/// keep their order and type. Empty cells are left unwritten; dates and
/// durations get a number format so they read back as dates.
pub fn assemble(tables: &[(&str, &Table)]) -> Result<Vec<u8>> {
    let mut book = XlsxWorkbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let date_time = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let elapsed = Format::new().set_num_format("[h]:mm:ss");

    for &(name, table) in tables {
        let sheet = book.add_worksheet();
        sheet
            .set_name(name)
            .with_context(|| format!("invalid sheet name '{}'", name))?;

        for (c, column) in table.columns().iter().enumerate() {
            sheet.write_string(0, col_num(c)?, column)?;
        }

        for (r, row) in table.rows().iter().enumerate() {
            let r = u32::try_from(r + 1).context("row index out of range")?;
            for (c, cell) in row.iter().enumerate() {
                let c = col_num(c)?;
                match cell {
                    Cell::Empty => continue,
                    Cell::Text(s) => sheet.write_string(r, c, s)?,
                    Cell::Number(n) => sheet.write_number(r, c, *n)?,
                    Cell::Bool(b) => sheet.write_boolean(r, c, *b)?,
                    Cell::DateTime(n) if n.fract() == 0.0 => {
                        sheet.write_number_with_format(r, c, *n, &date)?
                    }
                    Cell::DateTime(n) => sheet.write_number_with_format(r, c, *n, &date_time)?,
                    Cell::Duration(n) => sheet.write_number_with_format(r, c, *n, &elapsed)?,
                };
            }
        }
    }

    book.save_to_buffer()
        .context("serializing workbook")
}

/// Assemble every sheet of `workbook` in its original order.
pub fn assemble_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    let tables: Vec<(&str, &Table)> = workbook
        .sheets()
        .iter()
        .map(|(name, table)| (name.as_str(), table))
        .collect();
    assemble(&tables)
}

/// Assemble and write the workbook to `path`.
pub fn write_workbook<P: AsRef<Path>>(path: P, workbook: &Workbook) -> Result<()> {
    let path = path.as_ref();
    let bytes = assemble_workbook(workbook)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    fs::write(path, &bytes).with_context(|| format!("writing {:?}", path))?;
    info!(path = %path.display(), bytes = bytes.len(), sheets = workbook.len(), "workbook saved");
    Ok(())
}

fn col_num(c: usize) -> Result<u16> {
    u16::try_from(c).context("column index out of range")
}
