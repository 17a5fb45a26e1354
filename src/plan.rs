//! Mapping rules and plans, plus their JSON/YAML persistence.
//!
//! Coordinates are stored as canonical strings (`"B"`, `"A1"`, `"A1:B10"`),
//! operators as their tags (`"equals"`) and row ranges as `[start, end]`.

use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    coordinate::Coordinate,
    data::Value,
    error::{MappingError, Result},
    filter::MatchOperator,
};

/// Inclusive, 1-based row window over a cleaned table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(usize, usize)", into = "(usize, usize)")]
pub struct RowRange {
    start: usize,
    end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start < 1 {
            return Err(MappingError::format(
                "row range",
                format!("{start}-{end}"),
                "rows start at 1",
            ));
        }
        if start > end {
            return Err(MappingError::format(
                "row range",
                format!("{start}-{end}"),
                "start row is after end row",
            ));
        }
        Ok(RowRange { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Zero-based half-open bounds clamped to `row_count`.
    pub fn bounds(&self, row_count: usize) -> (usize, usize) {
        let lower = (self.start - 1).min(row_count);
        let upper = self.end.min(row_count);
        (lower, upper)
    }
}

impl TryFrom<(usize, usize)> for RowRange {
    type Error = MappingError;

    fn try_from((start, end): (usize, usize)) -> Result<Self> {
        RowRange::new(start, end)
    }
}

impl From<RowRange> for (usize, usize) {
    fn from(range: RowRange) -> Self {
        (range.start, range.end)
    }
}

/// Find rows in a source table, read a value, find rows in a target table and
/// write the value into the target's insert column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source_file: String,
    pub source_match_coordinate: Coordinate,
    #[serde(default)]
    pub source_match_value: Option<Value>,
    pub source_value_coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_match_row_range: Option<RowRange>,
    pub target_file: String,
    pub target_match_coordinate: Coordinate,
    #[serde(default)]
    pub target_match_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_match_row_range: Option<RowRange>,
    pub target_insert_coordinate: Coordinate,
    #[serde(default = "default_operator")]
    pub match_operator: MatchOperator,
    #[serde(default = "default_overwrite")]
    pub overwrite_existing: bool,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_operator() -> MatchOperator {
    MatchOperator::Equals
}

fn default_overwrite() -> bool {
    true
}

impl MappingRule {
    /// A rule with `equals` matching and overwriting enabled. Coordinates are
    /// parsed from text; match values default to none.
    pub fn new(
        name: impl Into<String>,
        source_file: impl Into<String>,
        source_match: &str,
        source_value: &str,
        target_file: impl Into<String>,
        target_match: &str,
        target_insert: &str,
    ) -> Result<Self> {
        Ok(MappingRule {
            id: new_id(),
            name: name.into(),
            description: String::new(),
            source_file: source_file.into(),
            source_match_coordinate: Coordinate::parse(source_match)?,
            source_match_value: None,
            source_value_coordinate: Coordinate::parse(source_value)?,
            source_match_row_range: None,
            target_file: target_file.into(),
            target_match_coordinate: Coordinate::parse(target_match)?,
            target_match_value: None,
            target_match_row_range: None,
            target_insert_coordinate: Coordinate::parse(target_insert)?,
            match_operator: MatchOperator::Equals,
            overwrite_existing: true,
        })
    }

    pub fn with_match_values(
        mut self,
        source: impl Into<Value>,
        target: impl Into<Value>,
    ) -> Self {
        self.source_match_value = Some(source.into());
        self.target_match_value = Some(target.into());
        self
    }

    pub fn with_operator(mut self, operator: MatchOperator) -> Self {
        self.match_operator = operator;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    pub fn with_source_rows(mut self, range: RowRange) -> Self {
        self.source_match_row_range = Some(range);
        self
    }

    pub fn with_target_rows(mut self, range: RowRange) -> Self {
        self.target_match_row_range = Some(range);
        self
    }

    pub fn required_tables(&self) -> BTreeSet<&str> {
        [self.source_file.as_str(), self.target_file.as_str()]
            .into_iter()
            .collect()
    }
}

/// An ordered list of rules executed one after another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingPlan {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<MappingRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanFormat {
    Json,
    Yaml,
}

impl PlanFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                PlanFormat::Yaml
            }
            _ => PlanFormat::Json,
        }
    }
}

impl MappingPlan {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        MappingPlan {
            id: new_id(),
            name: name.into(),
            description: String::new(),
            rules: Vec::new(),
            tags: Vec::new(),
            created: now,
            modified: now,
        }
    }

    pub fn add_rule(&mut self, rule: MappingRule) {
        self.rules.push(rule);
        self.modified = Utc::now();
    }

    /// Removes every rule with `id`; returns whether anything was removed.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.id != id);
        let removed = self.rules.len() != before;
        if removed {
            self.modified = Utc::now();
        }
        removed
    }

    pub fn rule(&self, id: &str) -> Option<&MappingRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn required_tables(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .flat_map(MappingRule::required_tables)
            .collect()
    }

    /// Writes the plan as YAML for `.yaml`/`.yml` paths, JSON otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        let plan_error = |reason: String| MappingError::Plan {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::create(path).map_err(|err| plan_error(format!("creating file: {err}")))?;
        let writer = BufWriter::new(file);
        match PlanFormat::for_path(path) {
            PlanFormat::Json => serde_json::to_writer_pretty(writer, self)
                .map_err(|err| plan_error(format!("writing JSON: {err}"))),
            PlanFormat::Yaml => serde_yaml::to_writer(writer, self)
                .map_err(|err| plan_error(format!("writing YAML: {err}"))),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let plan_error = |reason: String| MappingError::Plan {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|err| plan_error(format!("opening file: {err}")))?;
        let reader = BufReader::new(file);
        match PlanFormat::for_path(path) {
            PlanFormat::Json => serde_json::from_reader(reader)
                .map_err(|err| plan_error(format!("parsing JSON: {err}"))),
            PlanFormat::Yaml => serde_yaml::from_reader(reader)
                .map_err(|err| plan_error(format!("parsing YAML: {err}"))),
        }
    }
}
