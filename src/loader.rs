//! Reads workbooks into [`Table`]s.
//!
//! Two reading paths exist:
//!
//! - **Standard**: the first sheet is read without a header row. Row 1 of the
//!   sheet becomes data row 0 and columns are labelled `A`, `B`, ... `AA` by
//!   position, so coordinates typed by a user line up with what Excel shows.
//! - **Complex report**: every sheet is read with a header row. Multi-sheet
//!   reports usually carry a title block above the header, so a fixed list of
//!   header-skip strategies is tried per sheet and the first that produces
//!   data wins.
//!
//! [`WorkbookLoader::load`] picks the path with [`WorkbookLoader::detect_complex_report`]
//! unless [`LoadMode`] forces one.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use chrono::Timelike;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    coordinate::to_column_letters,
    data::{Value, parse_naive_date, parse_naive_datetime},
    error::{MappingError, Result},
    table::Table,
    table_set::TableSet,
};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_DATA_ROWS: usize = 1_000_000;
pub const DEFAULT_HEADER_SKIP_ORDER: [usize; 4] = [2, 1, 3, 0];

/// Keywords that mark the first sheet of a power-station metering report.
pub const DEFAULT_COMPLEX_KEYWORDS: [&str; 6] = ["母线", "主变", "变电站", "电度", "不平衡", "kV"];

/// Labels given to blank header cells in complex reports, by position.
const POSITIONAL_HEADERS: [&str; 5] = [
    "device id",
    "prior reading",
    "current reading",
    "multiplier",
    "output quantity",
];

/// How many leading rows and columns of the first sheet are scanned for
/// report keywords.
const KEYWORD_SCAN_WINDOW: usize = 5;

type Grid = Vec<Vec<Option<Value>>>;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum LoadMode {
    /// Detect complex reports and fall back to the standard path.
    #[default]
    Auto,
    /// First sheet only, positional `A`, `B`, `C` column labels.
    Standard,
    /// Every sheet, header row located by the skip strategies.
    Complex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    pub max_file_size: u64,
    /// Tables longer than this are truncated with a warning.
    pub max_data_rows: usize,
    /// Accepted file extensions, compared case-insensitively without the dot.
    pub supported_extensions: Vec<String>,
    /// Workbooks with more sheets than this are treated as complex reports.
    pub complex_sheet_threshold: usize,
    pub complex_keywords: Vec<String>,
    /// Leading rows to skip before the header, tried in order.
    pub header_skip_order: Vec<usize>,
    pub mode: LoadMode,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_data_rows: DEFAULT_MAX_DATA_ROWS,
            supported_extensions: vec!["xlsx".into(), "xls".into()],
            complex_sheet_threshold: 5,
            complex_keywords: DEFAULT_COMPLEX_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            header_skip_order: DEFAULT_HEADER_SKIP_ORDER.to_vec(),
            mode: LoadMode::Auto,
        }
    }
}

/// One way of turning a raw sheet grid into a table. Strategies return `None`
/// when the grid does not fit their assumptions so the next one can run.
pub trait SheetStrategy {
    fn describe(&self) -> String;
    fn read(&self, name: &str, grid: &Grid) -> Option<Table>;
}

/// No header row: every grid row is data, columns labelled by position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalStrategy;

impl SheetStrategy for PositionalStrategy {
    fn describe(&self) -> String {
        "positional columns".to_string()
    }

    fn read(&self, name: &str, grid: &Grid) -> Option<Table> {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let headers = (0..width).map(to_column_letters).collect();
        let mut table = Table::from_rows(name, headers, grid.clone());
        table.drop_empty_rows();
        Some(table)
    }
}

/// Skips `skip_rows` leading rows and takes the next row as the header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderRowStrategy {
    pub skip_rows: usize,
}

impl SheetStrategy for HeaderRowStrategy {
    fn describe(&self) -> String {
        format!("header after {} skipped row(s)", self.skip_rows)
    }

    fn read(&self, name: &str, grid: &Grid) -> Option<Table> {
        let header = grid.get(self.skip_rows)?;
        let data = grid.get(self.skip_rows + 1..).filter(|rows| !rows.is_empty())?;
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let mut labels = header.clone();
        labels.resize(width, None);
        let headers = make_unique_columns(clean_column_names(&labels));

        let mut table = Table::from_rows(name, headers, data.to_vec());
        table.drop_empty_rows();
        let first_row_has_data = table
            .row(0)
            .is_some_and(|row| row.iter().any(Option::is_some));
        first_row_has_data.then_some(table)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookLoader {
    options: LoaderOptions,
}

impl WorkbookLoader {
    pub fn new(options: LoaderOptions) -> Self {
        WorkbookLoader { options }
    }

    /// Loads every workbook in order. The first failing file aborts the batch.
    pub fn load_many<P: AsRef<Path>>(&self, paths: &[P]) -> Result<TableSet> {
        let mut tables = TableSet::new();
        for path in paths {
            tables.extend(self.load(path.as_ref())?);
        }
        info!("Loaded {} table(s) from {} workbook(s)", tables.len(), paths.len());
        Ok(tables)
    }

    /// Loads one workbook into a table set keyed by `<stem>` (standard) or
    /// `<stem>_<sheet>` (complex).
    pub fn load(&self, path: &Path) -> Result<TableSet> {
        let size = self.validate_file(path)?;
        let stem = file_stem(path);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());
        debug!("Loading {path:?} ({size} bytes)");

        let complex = match self.options.mode {
            LoadMode::Auto => self.detect_complex_report(path),
            LoadMode::Standard => false,
            LoadMode::Complex => true,
        };

        let mut tables = TableSet::new();
        if complex {
            info!("Reading {path:?} as a multi-sheet report");
            for table in self.load_complex(path)? {
                tables.insert_from_file(table.name().to_string(), table, &file_name);
            }
            if tables.is_empty() {
                warn!("No sheet of {path:?} produced data as a report; reading it positionally");
            }
        }

        if tables.is_empty() {
            let table = self.load_standard(path)?;
            if table.is_empty() {
                warn!("Workbook {path:?} contains no data rows");
            } else {
                tables.insert_from_file(stem, table, &file_name);
            }
        }
        Ok(tables)
    }

    /// Checks existence, extension and size. Returns the file size in bytes.
    pub fn validate_file(&self, path: &Path) -> Result<u64> {
        let metadata = std::fs::metadata(path)
            .map_err(|err| MappingError::file(path, format!("file is not readable: {err}")))?;
        if !metadata.is_file() {
            return Err(MappingError::file(path, "not a regular file"));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let supported = self
            .options
            .supported_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension));
        if !supported {
            return Err(MappingError::file(
                path,
                format!(
                    "unsupported extension '{extension}' (supported: {})",
                    self.options.supported_extensions.join(", ")
                ),
            ));
        }

        let size = metadata.len();
        if size > self.options.max_file_size {
            return Err(MappingError::file(
                path,
                format!(
                    "file is {:.1} MB, limit is {:.1} MB",
                    size as f64 / (1024.0 * 1024.0),
                    self.options.max_file_size as f64 / (1024.0 * 1024.0)
                ),
            ));
        }
        Ok(size)
    }

    /// True when the workbook has more sheets than the configured threshold or
    /// a report keyword appears in the top-left 5x5 block of its first sheet.
    /// Unreadable workbooks are not complex; the standard path reports the error.
    pub fn detect_complex_report(&self, path: &Path) -> bool {
        let mut workbook = match open_workbook(path) {
            Ok(workbook) => workbook,
            Err(err) => {
                debug!("Complex report detection skipped: {err}");
                return false;
            }
        };
        let sheet_names = workbook.sheet_names().to_vec();
        if sheet_names.len() > self.options.complex_sheet_threshold {
            debug!("{path:?} has {} sheets", sheet_names.len());
            return true;
        }
        let Some(first) = sheet_names.first() else {
            return false;
        };
        let grid = match workbook.worksheet_range(first) {
            Ok(range) => grid_from_range(&range),
            Err(err) => {
                debug!("Complex report detection could not read '{first}': {err}");
                return false;
            }
        };
        grid.iter()
            .take(KEYWORD_SCAN_WINDOW)
            .flat_map(|row| row.iter().take(KEYWORD_SCAN_WINDOW))
            .flatten()
            .any(|cell| {
                let text = cell.as_display();
                self.options
                    .complex_keywords
                    .iter()
                    .any(|keyword| text.contains(keyword.as_str()))
            })
    }

    /// Reads the first sheet with positional column labels and no header row.
    pub fn load_standard(&self, path: &Path) -> Result<Table> {
        let mut workbook = open_workbook(path)?;
        let sheet_names = workbook.sheet_names().to_vec();
        let stem = file_stem(path);
        let Some(first) = sheet_names.first() else {
            return Ok(Table::new(stem, Vec::new()));
        };
        let range = workbook
            .worksheet_range(first)
            .map_err(|err| MappingError::file(path, format!("reading sheet '{first}': {err}")))?;
        let grid = grid_from_range(&range);
        let strategy = PositionalStrategy;
        let mut table = strategy.read(&stem, &grid).unwrap_or_else(|| Table::new(stem.clone(), Vec::new()));
        self.enforce_row_limit(&mut table);
        debug!(
            "Read '{first}' of {path:?} using {}: {} row(s) x {} column(s)",
            strategy.describe(),
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }

    /// Reads every sheet with a located header row. Tables are named
    /// `<stem>_<sheet>`; sheets that cannot be read or yield no data are skipped.
    pub fn load_complex(&self, path: &Path) -> Result<Vec<Table>> {
        let mut workbook = open_workbook(path)?;
        let stem = file_stem(path);
        let mut tables = Vec::new();
        for sheet in workbook.sheet_names().to_vec() {
            let range = match workbook.worksheet_range(&sheet) {
                Ok(range) => range,
                Err(err) => {
                    warn!("Skipping sheet '{sheet}' of {path:?}: {err}");
                    continue;
                }
            };
            let key = format!("{stem}_{sheet}");
            match self.smart_read_sheet(&key, &grid_from_range(&range)) {
                Some(mut table) => {
                    self.enforce_row_limit(&mut table);
                    info!("Loaded sheet '{sheet}': {} row(s)", table.row_count());
                    tables.push(table);
                }
                None => debug!("Sheet '{sheet}' of {path:?} has no data"),
            }
        }
        Ok(tables)
    }

    /// Runs the header-skip strategies in configured order and keeps the first
    /// table that has data.
    pub fn smart_read_sheet(&self, name: &str, grid: &Grid) -> Option<Table> {
        self.options
            .header_skip_order
            .iter()
            .map(|&skip_rows| HeaderRowStrategy { skip_rows })
            .find_map(|strategy| {
                let table = strategy.read(name, grid)?;
                debug!("Sheet '{name}' read using {}", strategy.describe());
                Some(table)
            })
    }

    fn enforce_row_limit(&self, table: &mut Table) {
        if table.row_count() > self.options.max_data_rows {
            warn!(
                "Table '{}' has {} rows, truncating to {}",
                table.name(),
                table.row_count(),
                self.options.max_data_rows
            );
            table.truncate_rows(self.options.max_data_rows);
        }
    }
}

/// Replaces blank or placeholder header labels with positional defaults and
/// strips embedded line breaks and surrounding whitespace from the rest.
pub fn clean_column_names(labels: &[Option<Value>]) -> Vec<String> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let text = label.as_ref().map(Value::as_display).unwrap_or_default();
            let cleaned = text.replace(['\n', '\r'], "").trim().to_string();
            if is_placeholder_label(&cleaned) {
                positional_header(idx)
            } else {
                cleaned
            }
        })
        .collect()
}

/// Appends `_1`, `_2`, ... to repeated labels in order of appearance. A
/// suffix never reuses a label that is already taken.
pub fn make_unique_columns(columns: Vec<String>) -> Vec<String> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut emitted: HashSet<String> = HashSet::new();
    columns
        .into_iter()
        .map(|column| {
            let unique = if emitted.contains(&column) {
                let count = counters.entry(column.clone()).or_insert(0);
                loop {
                    *count += 1;
                    let candidate = format!("{column}_{count}");
                    if !emitted.contains(&candidate) {
                        break candidate;
                    }
                }
            } else {
                column
            };
            emitted.insert(unique.clone());
            unique
        })
        .collect()
}

fn is_placeholder_label(label: &str) -> bool {
    label.is_empty()
        || label.starts_with("Unnamed")
        || label.eq_ignore_ascii_case("nan")
        || label == "None"
}

fn positional_header(idx: usize) -> String {
    POSITIONAL_HEADERS
        .get(idx)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("column {}", idx + 1))
}

fn open_workbook(path: &Path) -> Result<Sheets<BufReader<File>>> {
    open_workbook_auto(path).map_err(|err| MappingError::file(path, err))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expands a calamine range into a grid anchored at `A1`, so column and row
/// positions match the sheet even when the used range starts further in.
fn grid_from_range(range: &Range<Data>) -> Grid {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let (height, width) = range.get_size();
    let (row_offset, col_offset) = (start_row as usize, start_col as usize);
    let mut grid = vec![vec![None; col_offset + width]; row_offset + height];
    for (r, row) in range.rows().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            grid[row_offset + r][col_offset + c] = cell_value(cell);
        }
    }
    grid
}

/// Whole floats become integers so a cell showing `202` compares as one.
/// Midnight timestamps become dates. Error cells and empty text are null.
fn cell_value(data: &Data) -> Option<Value> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(float_value(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(moment) if moment.num_seconds_from_midnight() == 0 => {
                Some(Value::Date(moment.date()))
            }
            Some(moment) => Some(Value::DateTime(moment)),
            None => Some(float_value(dt.as_f64())),
        },
        Data::DateTimeIso(s) => Some(
            parse_naive_datetime(s)
                .map(Value::DateTime)
                .or_else(|_| parse_naive_date(s).map(Value::Date))
                .unwrap_or_else(|_| Value::String(s.clone())),
        ),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Value::Integer(f as i64)
    } else {
        Value::Float(f)
    }
}
