//! Runs mapping rules against loaded tables.
//!
//! Each rule goes through three phases in order:
//!
//! 1. **Extract**: select source rows with the rule's operator and collect the
//!    non-null cells of the value column.
//! 2. **Locate**: select target rows with the same operator.
//! 3. **Insert**: write the extracted values into the insert column at the
//!    located rows, repeating the last value when there are more rows than
//!    values.
//!
//! An empty extract or locate phase ends the rule without touching the target.
//! The engine reports what it does through a [`MappingObserver`].

use itertools::Itertools;

use crate::{
    coordinate::Coordinate,
    data::{Value, is_empty_cell},
    error::{MappingError, Result},
    filter::evaluate,
    observer::{LogObserver, MappingObserver, TraceEvent},
    plan::{MappingPlan, MappingRule, RowRange},
    table::Table,
    table_set::TableSet,
};

/// Distinct target values reported when the locate phase finds nothing.
const NO_MATCH_SAMPLE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Applied {
        extracted: usize,
        positions: usize,
        written: usize,
    },
    /// No source row matched, or every matched row had a null value.
    NoSourceMatch,
    NoTargetMatch,
}

impl RuleOutcome {
    pub fn written(&self) -> usize {
        match self {
            RuleOutcome::Applied { written, .. } => *written,
            _ => 0,
        }
    }
}

#[derive(Debug)]
pub struct RuleReport {
    pub rule_id: String,
    pub rule_name: String,
    pub outcome: Result<RuleOutcome>,
}

/// Result of [`MappingEngine::execute_multiple`]: the updated target tables and
/// one report per rule, in rule order.
#[derive(Debug)]
pub struct BatchReport {
    pub tables: TableSet,
    pub reports: Vec<RuleReport>,
}

impl BatchReport {
    pub fn applied(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, Ok(RuleOutcome::Applied { .. })))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&RuleReport, &MappingError)> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|err| (r, err)))
    }

    pub fn cells_written(&self) -> usize {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(RuleOutcome::written)
            .sum()
    }
}

struct Extracted {
    rows: Vec<usize>,
    values: Vec<Value>,
}

pub struct MappingEngine<O: MappingObserver = LogObserver> {
    observer: O,
}

impl Default for MappingEngine<LogObserver> {
    fn default() -> Self {
        MappingEngine::new()
    }
}

impl MappingEngine<LogObserver> {
    pub fn new() -> Self {
        MappingEngine {
            observer: LogObserver,
        }
    }
}

impl<O: MappingObserver> MappingEngine<O> {
    pub fn with_observer(observer: O) -> Self {
        MappingEngine { observer }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Applies one rule, mutating the target table in place.
    ///
    /// Unknown table keys, coordinates that do not address a column and column
    /// indices past the end of a table are errors. All of them are detected
    /// before the first write.
    pub fn execute(
        &mut self,
        rule: &MappingRule,
        source: &TableSet,
        target: &mut TableSet,
    ) -> Result<RuleOutcome> {
        self.emit(TraceEvent::RuleStarted {
            rule: rule.name.clone(),
            source: rule.source_file.clone(),
            target: rule.target_file.clone(),
            operator: rule.match_operator,
        });

        let extracted = self.extract(rule, source.require(&rule.source_file)?)?;
        if extracted.values.is_empty() {
            self.emit(TraceEvent::NoSourceMatch {
                rule: rule.name.clone(),
                value: rule.source_match_value.clone(),
            });
            return Ok(RuleOutcome::NoSourceMatch);
        }
        self.emit(TraceEvent::SourceRowsMatched {
            rule: rule.name.clone(),
            rows: extracted.rows,
            values: extracted.values.clone(),
        });

        let table = target.require_mut(&rule.target_file)?;
        let positions = self.locate(rule, table)?;
        if positions.is_empty() {
            return Ok(RuleOutcome::NoTargetMatch);
        }
        self.emit(TraceEvent::TargetRowsMatched {
            rule: rule.name.clone(),
            rows: positions.clone(),
        });

        let written = self.insert(rule, table, &extracted.values, &positions)?;
        self.emit(TraceEvent::RuleFinished {
            rule: rule.name.clone(),
            extracted: extracted.values.len(),
            positions: positions.len(),
            written,
        });
        Ok(RuleOutcome::Applied {
            extracted: extracted.values.len(),
            positions: positions.len(),
            written,
        })
    }

    /// Runs `rules` in order against a copy of `target`. Later rules see the
    /// writes of earlier ones. A failing rule is recorded and the batch moves on.
    pub fn execute_multiple(
        &mut self,
        rules: &[MappingRule],
        source: &TableSet,
        target: &TableSet,
    ) -> BatchReport {
        let mut running = target.clone();
        let mut reports = Vec::with_capacity(rules.len());
        for rule in rules {
            // A rule only writes after every check has passed, so a failed rule
            // leaves `running` as it was.
            let outcome = self.execute(rule, source, &mut running);
            if let Err(err) = &outcome {
                self.emit(TraceEvent::RuleFailed {
                    rule: rule.name.clone(),
                    error: err.to_string(),
                });
            }
            reports.push(RuleReport {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                outcome,
            });
        }
        BatchReport {
            tables: running,
            reports,
        }
    }

    pub fn execute_plan(
        &mut self,
        plan: &MappingPlan,
        source: &TableSet,
        target: &TableSet,
    ) -> BatchReport {
        self.execute_multiple(&plan.rules, source, target)
    }

    fn extract(&mut self, rule: &MappingRule, table: &Table) -> Result<Extracted> {
        let match_cells = table.column_checked(rule.source_match_coordinate.column_index()?)?;
        let value_cells = table.column_checked(rule.source_value_coordinate.column_index()?)?;
        let (lower, upper) = window(rule.source_match_row_range, table.row_count());

        let mask = self.mask(
            rule,
            &match_cells[lower..upper],
            rule.source_match_value.as_ref(),
        );
        let (rows, values): (Vec<usize>, Vec<Value>) = mask
            .iter()
            .enumerate()
            .filter(|(_, hit)| **hit)
            .filter_map(|(offset, _)| {
                let row = lower + offset;
                value_cells[row].clone().map(|value| (row, value))
            })
            .unzip();
        Ok(Extracted { rows, values })
    }

    fn locate(&mut self, rule: &MappingRule, table: &Table) -> Result<Vec<usize>> {
        let cells = table.column_checked(rule.target_match_coordinate.column_index()?)?;
        let (lower, upper) = window(rule.target_match_row_range, table.row_count());
        let windowed = &cells[lower..upper];

        let positions = self
            .mask(rule, windowed, rule.target_match_value.as_ref())
            .iter()
            .enumerate()
            .filter_map(|(offset, hit)| hit.then_some(lower + offset))
            .collect::<Vec<_>>();

        if positions.is_empty() {
            let available = windowed
                .iter()
                .flatten()
                .unique_by(|value| value.as_display())
                .take(NO_MATCH_SAMPLE)
                .cloned()
                .collect();
            self.emit(TraceEvent::NoTargetMatch {
                rule: rule.name.clone(),
                value: rule.target_match_value.clone(),
                available,
            });
        }
        Ok(positions)
    }

    fn insert(
        &mut self,
        rule: &MappingRule,
        table: &mut Table,
        values: &[Value],
        positions: &[usize],
    ) -> Result<usize> {
        let column = rule.target_insert_coordinate.column_index()?;
        table.column_checked(column)?;

        let mut written = 0;
        for (i, &row) in positions.iter().enumerate() {
            let Some(new) = values.get(i).or(values.last()).cloned() else {
                break;
            };
            let existing = table.cell(row, column).cloned();
            if !rule.overwrite_existing && !is_empty_cell(existing.as_ref()) {
                if let Some(existing) = existing {
                    self.emit(TraceEvent::CellSkipped {
                        rule: rule.name.clone(),
                        row,
                        existing,
                    });
                }
                continue;
            }
            table.set_cell(row, column, Some(new.clone()))?;
            written += 1;
            self.emit(TraceEvent::CellWritten {
                rule: rule.name.clone(),
                row,
                old: existing,
                new,
                repeated: i >= values.len(),
            });
        }
        Ok(written)
    }

    /// Evaluates the rule's operator, reporting coercions and turning an
    /// evaluation failure into an all-false mask.
    fn mask(&mut self, rule: &MappingRule, cells: &[Option<Value>], value: Option<&Value>) -> Vec<bool> {
        match evaluate(cells, value, rule.match_operator) {
            Ok(evaluation) => {
                for coercion in &evaluation.coercions {
                    self.emit(TraceEvent::CoercionTried {
                        rule: rule.name.clone(),
                        as_value: coercion.as_value.clone(),
                        matched: coercion.matched,
                    });
                }
                evaluation.mask
            }
            Err(err) => {
                self.emit(TraceEvent::EvaluationFallback {
                    rule: rule.name.clone(),
                    operator: rule.match_operator,
                    reason: err.to_string(),
                });
                vec![false; cells.len()]
            }
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        self.observer.on_event(&event);
    }
}

/// Checks that a rule can run against the given tables without running it.
/// Every problem found is returned; an empty list means the rule is runnable.
pub fn validate(rule: &MappingRule, source: &TableSet, target: &TableSet) -> Vec<String> {
    let mut problems = Vec::new();

    match source.get(&rule.source_file) {
        Some(table) => {
            check_column(&mut problems, "source match", &rule.source_match_coordinate, table);
            check_column(&mut problems, "source value", &rule.source_value_coordinate, table);
        }
        None => problems.push(format!("Source table '{}' is not loaded", rule.source_file)),
    }

    match target.get(&rule.target_file) {
        Some(table) => {
            check_column(&mut problems, "target match", &rule.target_match_coordinate, table);
            check_column(&mut problems, "target insert", &rule.target_insert_coordinate, table);
        }
        None => problems.push(format!("Target table '{}' is not loaded", rule.target_file)),
    }

    if !rule.match_operator.is_unary() {
        if rule.source_match_value.is_none() {
            problems.push(format!(
                "Operator '{}' needs a source match value",
                rule.match_operator
            ));
        }
        if rule.target_match_value.is_none() {
            problems.push(format!(
                "Operator '{}' needs a target match value",
                rule.match_operator
            ));
        }
    }
    problems
}

fn check_column(problems: &mut Vec<String>, role: &str, coordinate: &Coordinate, table: &Table) {
    match coordinate.column_index() {
        Ok(index) if index < table.column_count() => {}
        Ok(index) => problems.push(format!(
            "{role} column {} (index {index}) is outside table '{}' with {} column(s)",
            coordinate.column_letters(),
            table.name(),
            table.column_count()
        )),
        Err(err) => problems.push(format!("{role} coordinate: {err}")),
    }
}

fn window(range: Option<RowRange>, row_count: usize) -> (usize, usize) {
    range.map_or((0, row_count), |range| range.bounds(row_count))
}
