use std::path::{Path, PathBuf};

use log::info;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::{
    data::Value,
    error::{MappingError, Result},
    table::Table,
    table_set::TableSet,
};

const SHEET_NAME_LIMIT: usize = 31;
const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Writes `table` to `path` with its column labels as the first row.
pub fn write_table(table: &Table, path: &Path) -> Result<()> {
    let write_error = |err: XlsxError| MappingError::Write {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name(table.name()))
        .map_err(write_error)?;
    fill_worksheet(worksheet, table).map_err(write_error)?;
    workbook.save(path).map_err(write_error)?;
    info!(
        "Wrote {} row(s) x {} column(s) to {path:?}",
        table.row_count(),
        table.column_count()
    );
    Ok(())
}

/// Writes every table of `tables` to `<dir>/<key>.xlsx` and returns the paths
/// in table order.
pub fn write_tables(tables: &TableSet, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|err| MappingError::Write {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    })?;
    tables
        .iter()
        .map(|(key, table)| {
            let path = dir.join(format!("{key}.xlsx"));
            write_table(table, &path).map(|()| path)
        })
        .collect()
}

fn fill_worksheet(worksheet: &mut Worksheet, table: &Table) -> std::result::Result<(), XlsxError> {
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    for (col, column) in table.columns().iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
        worksheet.write_string(0, col, &column.name)?;

        for (row, cell) in column.cells.iter().enumerate() {
            let Some(value) = cell else {
                continue;
            };
            let row = u32::try_from(row + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
            match value {
                Value::Boolean(b) => worksheet.write_boolean(row, col, *b)?,
                Value::Integer(i) => worksheet.write_number(row, col, *i as f64)?,
                Value::Float(f) => worksheet.write_number(row, col, *f)?,
                Value::Date(d) => worksheet.write_datetime_with_format(row, col, d, &date_format)?,
                Value::DateTime(dt) => {
                    worksheet.write_datetime_with_format(row, col, dt, &datetime_format)?
                }
                Value::String(s) => worksheet.write_string(row, col, s)?,
            };
        }
    }
    Ok(())
}

/// Excel sheet names are at most 31 characters and may not contain `[]:*?/\`.
fn sheet_name(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(SHEET_NAME_LIMIT)
        .collect::<String>();
    let cleaned = cleaned.trim_matches('\'').to_string();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}
