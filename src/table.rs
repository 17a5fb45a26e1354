use std::borrow::Cow;
use std::fmt::Write as _;

use serde::Serialize;

use crate::{
    data::{Value, display_cell},
    error::{MappingError, Result},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Option<Value>>,
}

/// A named rectangular table. Every column holds the same number of cells;
/// the constructors pad short rows with nulls to keep it that way.
///
/// Columns are addressed by position (coordinates resolve to an index), so
/// their order is significant and never changes after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Table {
            name: name.into(),
            columns: headers
                .into_iter()
                .map(|name| Column {
                    name,
                    cells: Vec::new(),
                })
                .collect(),
            row_count: 0,
        }
    }

    /// Builds a table from row-major cells. Rows shorter than the header are
    /// padded with nulls; cells beyond the header width are dropped.
    pub fn from_rows(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<Option<Value>>>,
    ) -> Self {
        let mut table = Table::new(name, headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn from_columns(name: impl Into<String>, mut columns: Vec<Column>) -> Self {
        let row_count = columns.iter().map(|c| c.cells.len()).max().unwrap_or(0);
        for column in &mut columns {
            column.cells.resize(row_count, None);
        }
        Table {
            name: name.into(),
            columns,
            row_count,
        }
    }

    pub fn push_row(&mut self, mut row: Vec<Option<Value>>) {
        row.resize(self.columns.len(), None);
        for (column, cell) in self.columns.iter_mut().zip(row) {
            column.cells.push(cell);
        }
        self.row_count += 1;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column(&self, index: usize) -> Option<&[Option<Value>]> {
        self.columns.get(index).map(|c| c.cells.as_slice())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_checked(&self, index: usize) -> Result<&[Option<Value>]> {
        self.column(index)
            .ok_or_else(|| MappingError::column_out_of_range(index, self.columns.len(), &self.name))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.columns
            .get(column)
            .and_then(|c| c.cells.get(row))
            .and_then(Option::as_ref)
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Option<Value>) -> Result<()> {
        let column_count = self.columns.len();
        let row_count = self.row_count;
        let name = self.name.clone();
        let target = self
            .columns
            .get_mut(column)
            .ok_or_else(|| MappingError::column_out_of_range(column, column_count, &name))?;
        let slot = target.cells.get_mut(row).ok_or(MappingError::Range {
            axis: "row",
            index: row,
            count: row_count,
            table: name,
        })?;
        *slot = value;
        Ok(())
    }

    pub fn row(&self, index: usize) -> Option<Vec<Option<&Value>>> {
        (index < self.row_count).then(|| {
            self.columns
                .iter()
                .map(|c| c.cells[index].as_ref())
                .collect()
        })
    }

    /// Removes rows where every cell is null; remaining rows are renumbered
    /// contiguously from zero.
    pub fn drop_empty_rows(&mut self) -> usize {
        let keep = (0..self.row_count)
            .map(|row| self.columns.iter().any(|c| c.cells[row].is_some()))
            .collect::<Vec<_>>();
        let removed = keep.iter().filter(|kept| !**kept).count();
        if removed == 0 {
            return 0;
        }
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.cells.retain(|_| flags.next().copied().unwrap_or(false));
        }
        self.row_count -= removed;
        removed
    }

    pub fn truncate_rows(&mut self, max_rows: usize) {
        if self.row_count <= max_rows {
            return;
        }
        for column in &mut self.columns {
            column.cells.truncate(max_rows);
        }
        self.row_count = max_rows;
    }

    /// Infers a display type per column from its non-null cells: the shared
    /// type when all cells agree, otherwise `string`.
    pub fn infer_column_types(&self) -> Vec<(String, &'static str)> {
        self.columns
            .iter()
            .map(|column| {
                let mut kinds = column.cells.iter().flatten().map(Value::type_name);
                let inferred = match kinds.next() {
                    Some(first) if kinds.all(|kind| kind == first) => first,
                    _ => "string",
                };
                (column.name.clone(), inferred)
            })
            .collect()
    }

    pub fn display_rows(&self, limit: Option<usize>) -> Vec<Vec<String>> {
        let take = limit.unwrap_or(self.row_count).min(self.row_count);
        (0..take)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| display_cell(c.cells[row].as_ref()))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<String>,
}

impl From<&Table> for TableSummary {
    fn from(table: &Table) -> Self {
        TableSummary {
            name: table.name.clone(),
            rows: table.row_count,
            columns: table.columns.len(),
            headers: table.headers(),
        }
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(
            value
                .chars()
                .map(|ch| match ch {
                    '\n' | '\r' | '\t' => ' ',
                    other => other,
                })
                .collect(),
        )
    } else {
        Cow::Borrowed(value)
    }
}
