#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use sheet_mapper::data::Value;
use tempfile::{TempDir, tempdir};

pub type Row = Vec<Option<Value>>;

pub fn text(value: &str) -> Option<Value> {
    Some(Value::from(value))
}

pub fn int(value: i64) -> Option<Value> {
    Some(Value::Integer(value))
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes a workbook with one sheet per `(name, rows)` pair. Rows are
    /// placed from `A1` exactly as given; `None` leaves a cell blank.
    pub fn workbook(&self, name: &str, sheets: &[(&str, Vec<Row>)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        for (sheet, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*sheet).expect("sheet name");
            for (r, row) in rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    let (r, c) = (r as u32, c as u16);
                    match cell {
                        None => {}
                        Some(Value::String(s)) => {
                            worksheet.write_string(r, c, s).expect("write string");
                        }
                        Some(Value::Integer(i)) => {
                            worksheet.write_number(r, c, *i as f64).expect("write number");
                        }
                        Some(Value::Float(f)) => {
                            worksheet.write_number(r, c, *f).expect("write number");
                        }
                        Some(Value::Boolean(b)) => {
                            worksheet.write_boolean(r, c, *b).expect("write boolean");
                        }
                        Some(other) => {
                            worksheet
                                .write_string(r, c, other.as_display())
                                .expect("write string");
                        }
                    }
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    /// Meter readings keyed by the text in column B, values in column C.
    pub fn meters_workbook(&self) -> PathBuf {
        self.workbook(
            "meters.xlsx",
            &[(
                "Sheet1",
                vec![
                    vec![int(1), text("201 main"), int(10)],
                    vec![int(2), text("202 main"), int(20)],
                    vec![int(3), text("202 main"), int(30)],
                    vec![int(4), text("203 main"), int(40)],
                ],
            )],
        )
    }

    /// Summary sheet whose column D receives readings matched on column A.
    /// The label row keeps column D inside the sheet's used range, so data
    /// starts at table row 1.
    pub fn summary_workbook(&self, existing: [Option<Value>; 3]) -> PathBuf {
        let [first, second, third] = existing;
        self.workbook(
            "summary.xlsx",
            &[(
                "Sheet1",
                vec![
                    vec![text("meter"), text("unit"), text("note"), text("reading")],
                    vec![text("201 main"), None, None, first],
                    vec![text("202 main"), None, None, second],
                    vec![text("202 main"), None, None, third],
                ],
            )],
        )
    }
}
