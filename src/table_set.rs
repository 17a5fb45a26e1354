use std::{collections::BTreeSet, path::Path};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    data::Value,
    error::{MappingError, Result},
    table::{Column, Table, TableSummary},
};

/// Name of the column [`TableSet::combined`] appends to record row origin.
pub const SOURCE_FILE_COLUMN: &str = "_source_file";

/// Standard workbooks are keyed by file stem, complex ones by `<stem>_<sheet>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: IndexMap<String, Table>,
    origins: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub table: String,
    pub row: usize,
    pub column: String,
    pub matched: Value,
    pub target: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkbookSummary {
    pub total_tables: usize,
    pub total_rows: usize,
    pub total_columns: usize,
    pub tables: Vec<TableSummary>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, table: Table) -> Option<Table> {
        self.tables.insert(key.into(), table)
    }

    pub fn insert_from_file(&mut self, key: impl Into<String>, table: Table, file_name: &str) {
        let key = key.into();
        self.origins.insert(key.clone(), file_name.to_string());
        self.tables.insert(key, table);
    }

    pub fn extend(&mut self, other: TableSet) {
        self.origins.extend(other.origins);
        self.tables.extend(other.tables);
    }

    pub fn get(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Table> {
        self.tables.get_mut(key)
    }

    pub fn require(&self, key: &str) -> Result<&Table> {
        self.tables.get(key).ok_or_else(|| MappingError::UnknownTable {
            key: key.to_string(),
        })
    }

    pub fn require_mut(&mut self, key: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(key)
            .ok_or_else(|| MappingError::UnknownTable {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn unique_headers(&self) -> Vec<String> {
        self.tables
            .values()
            .flat_map(|t| t.headers())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Stacks every table into one, aligned by column label. Missing cells are
    /// null and a trailing [`SOURCE_FILE_COLUMN`] records the origin key.
    pub fn combined(&self) -> Table {
        let headers = self.unique_headers();
        let mut columns = headers
            .iter()
            .map(|name| Column {
                name: name.clone(),
                cells: Vec::new(),
            })
            .collect::<Vec<_>>();
        let mut origin = Vec::new();

        for (key, table) in &self.tables {
            for column in &mut columns {
                match table.column_index(&column.name) {
                    Some(idx) => column
                        .cells
                        .extend(table.columns()[idx].cells.iter().cloned()),
                    None => column
                        .cells
                        .extend(std::iter::repeat_n(None, table.row_count())),
                }
            }
            origin.extend(std::iter::repeat_n(
                Some(Value::String(key.clone())),
                table.row_count(),
            ));
        }

        columns.push(Column {
            name: SOURCE_FILE_COLUMN.to_string(),
            cells: origin,
        });
        Table::from_columns("combined", columns)
    }

    /// Case-insensitive substring search over the text cells of every table.
    ///
    /// Each hit carries a target value read from the same row: the column
    /// labelled `target_column`, else the first column whose label contains it
    /// (case-insensitive), else the second column.
    pub fn search(&self, term: &str, target_column: Option<&str>) -> Vec<SearchHit> {
        let needle = term.to_lowercase();
        let mut hits = Vec::new();
        for (key, table) in &self.tables {
            for column in table.columns() {
                for (row, cell) in column.cells.iter().enumerate() {
                    let Some(Value::String(text)) = cell else {
                        continue;
                    };
                    if !text.to_lowercase().contains(&needle) {
                        continue;
                    }
                    hits.push(SearchHit {
                        table: key.clone(),
                        row,
                        column: column.name.clone(),
                        matched: Value::String(text.clone()),
                        target: target_value(table, row, target_column),
                    });
                }
            }
        }
        hits
    }

    pub fn original_file_names(&self) -> Vec<String> {
        if !self.origins.is_empty() {
            return self.origins.values().cloned().sorted().dedup().collect();
        }
        self.tables
            .keys()
            .map(|key| match key.split_once('_') {
                Some((stem, _)) => format!("{stem}.xlsx"),
                None => format!("{key}.xlsx"),
            })
            .sorted()
            .dedup()
            .collect()
    }

    /// Sheet-level keys (`<stem>_<sheet>`) loaded from one workbook.
    pub fn sheets_for_file(&self, file_name: &str) -> Vec<&str> {
        let stem = file_stem(file_name);
        let prefix = format!("{stem}_");
        self.tables
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    /// First sheet of a workbook, or the first whose key contains `sheet_hint`
    /// (case-insensitive).
    pub fn table_for_file(&self, file_name: &str, sheet_hint: Option<&str>) -> Option<&Table> {
        let sheets = self.sheets_for_file(file_name);
        if let Some(hint) = sheet_hint.map(str::to_lowercase) {
            if let Some(key) = sheets.iter().find(|key| key.to_lowercase().contains(&hint)) {
                return self.tables.get(*key);
            }
        }
        sheets.first().and_then(|key| self.tables.get(*key))
    }

    pub fn summary(&self) -> WorkbookSummary {
        WorkbookSummary {
            total_tables: self.tables.len(),
            total_rows: self.tables.values().map(Table::row_count).sum(),
            total_columns: self.unique_headers().len(),
            tables: self
                .tables
                .iter()
                .map(|(key, table)| TableSummary {
                    name: key.clone(),
                    ..TableSummary::from(table)
                })
                .collect(),
        }
    }
}

impl IntoIterator for TableSet {
    type Item = (String, Table);
    type IntoIter = indexmap::map::IntoIter<String, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}

fn target_value(table: &Table, row: usize, target_column: Option<&str>) -> Option<Value> {
    let headers = table.headers();
    let index = target_column
        .and_then(|wanted| {
            headers.iter().position(|h| h == wanted).or_else(|| {
                let lowered = wanted.to_lowercase();
                headers
                    .iter()
                    .position(|h| h.to_lowercase().contains(&lowered))
            })
        })
        .or_else(|| (headers.len() > 1).then_some(1))?;
    table.cell(row, index).cloned()
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
