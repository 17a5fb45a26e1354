use log::{debug, info, warn};

use crate::{data::Value, filter::MatchOperator};

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    RuleStarted {
        rule: String,
        source: String,
        target: String,
        operator: MatchOperator,
    },
    SourceRowsMatched {
        rule: String,
        rows: Vec<usize>,
        values: Vec<Value>,
    },
    TargetRowsMatched {
        rule: String,
        rows: Vec<usize>,
    },
    /// The direct `equals` comparison found nothing and a re-typed comparison
    /// value was tried.
    CoercionTried {
        rule: String,
        as_value: Value,
        matched: usize,
    },
    /// Operator evaluation failed and was replaced by an all-false mask.
    EvaluationFallback {
        rule: String,
        operator: MatchOperator,
        reason: String,
    },
    NoSourceMatch {
        rule: String,
        value: Option<Value>,
    },
    NoTargetMatch {
        rule: String,
        value: Option<Value>,
        /// Up to ten distinct non-null values of the target match column.
        available: Vec<Value>,
    },
    CellWritten {
        rule: String,
        row: usize,
        old: Option<Value>,
        new: Value,
        repeated: bool,
    },
    CellSkipped {
        rule: String,
        row: usize,
        existing: Value,
    },
    RuleFinished {
        rule: String,
        extracted: usize,
        positions: usize,
        written: usize,
    },
    RuleFailed {
        rule: String,
        error: String,
    },
}

pub trait MappingObserver {
    fn on_event(&mut self, event: &TraceEvent);
}

/// Forwards every event to the `log` facade. Evaluation fallbacks and failed
/// rules are warnings; per-cell detail is debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl MappingObserver for LogObserver {
    fn on_event(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::RuleStarted {
                rule,
                source,
                target,
                operator,
            } => info!("Mapping '{rule}': {source} -> {target} ({operator})"),
            TraceEvent::SourceRowsMatched { rule, rows, values } => debug!(
                "'{rule}': source rows {rows:?} matched, extracted {} value(s)",
                values.len()
            ),
            TraceEvent::TargetRowsMatched { rule, rows } => {
                debug!("'{rule}': target rows {rows:?} matched")
            }
            TraceEvent::CoercionTried {
                rule,
                as_value,
                matched,
            } => debug!("'{rule}': retried equality as '{as_value}', {matched} match(es)"),
            TraceEvent::EvaluationFallback {
                rule,
                operator,
                reason,
            } => warn!("'{rule}': {operator} evaluation fell back to no matches: {reason}"),
            TraceEvent::NoSourceMatch { rule, value } => info!(
                "'{rule}': no source rows match '{}', rule skipped",
                display_option(value.as_ref())
            ),
            TraceEvent::NoTargetMatch {
                rule,
                value,
                available,
            } => info!(
                "'{rule}': no target rows match '{}', rule skipped (column holds e.g. {})",
                display_option(value.as_ref()),
                available
                    .iter()
                    .map(Value::as_display)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TraceEvent::CellWritten {
                rule,
                row,
                old,
                new,
                repeated,
            } => debug!(
                "'{rule}': row {row} '{}' -> '{new}'{}",
                display_option(old.as_ref()),
                if *repeated { " (last value repeated)" } else { "" }
            ),
            TraceEvent::CellSkipped {
                rule,
                row,
                existing,
            } => debug!("'{rule}': row {row} keeps '{existing}' (overwrite disabled)"),
            TraceEvent::RuleFinished {
                rule,
                extracted,
                positions,
                written,
            } => info!(
                "Mapping '{rule}' done: {extracted} value(s), {positions} position(s), {written} written"
            ),
            TraceEvent::RuleFailed { rule, error } => warn!("Mapping '{rule}' failed: {error}"),
        }
    }
}

/// Keeps every event in order. Useful for tests and for counting fallbacks.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<TraceEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::EvaluationFallback { .. }))
            .count()
    }

    pub fn written_rows(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::CellWritten { row, .. } => Some(*row),
                _ => None,
            })
            .collect()
    }
}

impl MappingObserver for RecordingObserver {
    fn on_event(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}

/// Fans events out to two observers.
pub struct Tee<'a, A: MappingObserver, B: MappingObserver>(pub &'a mut A, pub &'a mut B);

impl<A: MappingObserver, B: MappingObserver> MappingObserver for Tee<'_, A, B> {
    fn on_event(&mut self, event: &TraceEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}

fn display_option(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_else(|| "<none>".into())
}
