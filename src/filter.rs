use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{
    data::{Value, is_empty_cell},
    error::MappingError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    IsEmpty,
    IsNotEmpty,
}

impl MatchOperator {
    pub const ALL: [MatchOperator; 12] = [
        MatchOperator::Equals,
        MatchOperator::NotEquals,
        MatchOperator::Contains,
        MatchOperator::NotContains,
        MatchOperator::StartsWith,
        MatchOperator::EndsWith,
        MatchOperator::GreaterThan,
        MatchOperator::GreaterEqual,
        MatchOperator::LessThan,
        MatchOperator::LessEqual,
        MatchOperator::IsEmpty,
        MatchOperator::IsNotEmpty,
    ];

    /// Canonical tag used in plan files.
    pub fn tag(self) -> &'static str {
        match self {
            MatchOperator::Equals => "equals",
            MatchOperator::NotEquals => "not_equals",
            MatchOperator::Contains => "contains",
            MatchOperator::NotContains => "not_contains",
            MatchOperator::StartsWith => "starts_with",
            MatchOperator::EndsWith => "ends_with",
            MatchOperator::GreaterThan => "greater_than",
            MatchOperator::GreaterEqual => "greater_equal",
            MatchOperator::LessThan => "less_than",
            MatchOperator::LessEqual => "less_equal",
            MatchOperator::IsEmpty => "is_empty",
            MatchOperator::IsNotEmpty => "is_not_empty",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MatchOperator::Equals => "=",
            MatchOperator::NotEquals => "!=",
            MatchOperator::Contains => "contains",
            MatchOperator::NotContains => "not contains",
            MatchOperator::StartsWith => "startswith",
            MatchOperator::EndsWith => "endswith",
            MatchOperator::GreaterThan => ">",
            MatchOperator::GreaterEqual => ">=",
            MatchOperator::LessThan => "<",
            MatchOperator::LessEqual => "<=",
            MatchOperator::IsEmpty => "is empty",
            MatchOperator::IsNotEmpty => "is not empty",
        }
    }

    /// Whether the operator ignores the comparison value.
    pub fn is_unary(self) -> bool {
        matches!(self, MatchOperator::IsEmpty | MatchOperator::IsNotEmpty)
    }
}

impl fmt::Display for MatchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MatchOperator {
    type Err = MappingError;

    /// Accepts the canonical tag in any case, the upper-case enum spelling
    /// (`STARTS_WITH`), the compact symbol (`>=`, `startswith`) and spaced
    /// names (`starts with`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let compact = lowered.replace([' ', '-'], "_");
        let op = match compact.as_str() {
            "equals" | "eq" | "=" | "==" => MatchOperator::Equals,
            "not_equals" | "ne" | "!=" | "<>" => MatchOperator::NotEquals,
            "contains" => MatchOperator::Contains,
            "not_contains" => MatchOperator::NotContains,
            "starts_with" | "startswith" => MatchOperator::StartsWith,
            "ends_with" | "endswith" => MatchOperator::EndsWith,
            "greater_than" | "gt" | ">" => MatchOperator::GreaterThan,
            "greater_equal" | "ge" | ">=" => MatchOperator::GreaterEqual,
            "less_than" | "lt" | "<" => MatchOperator::LessThan,
            "less_equal" | "le" | "<=" => MatchOperator::LessEqual,
            "is_empty" | "is_null" | "empty" => MatchOperator::IsEmpty,
            "is_not_empty" | "is_not_null" | "not_empty" => MatchOperator::IsNotEmpty,
            _ => {
                return Err(MappingError::format(
                    "match operator",
                    s,
                    format!(
                        "expected one of {}",
                        MatchOperator::ALL.map(MatchOperator::tag).join(", ")
                    ),
                ));
            }
        };
        Ok(op)
    }
}

impl Serialize for MatchOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for MatchOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Why an evaluation could not run. The engine turns this into an all-false
/// mask and reports it through the observer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("operator '{operator}' needs a comparison value")]
    MissingValue { operator: MatchOperator },
    #[error("operator '{operator}' needs a numeric comparison value, got '{value}'")]
    NotNumeric { operator: MatchOperator, value: String },
}

/// Result of [`evaluate`]: the mask plus which comparisons the equality
/// fallback tried.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub mask: Vec<bool>,
    pub coercions: Vec<Coercion>,
}

impl Evaluation {
    pub fn matched(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    pub fn positions(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(idx, hit)| hit.then_some(idx))
            .collect()
    }
}

/// One cross-type comparison tried after a direct `equals` found nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Coercion {
    pub as_value: Value,
    pub matched: usize,
}

pub fn evaluate(
    cells: &[Option<Value>],
    value: Option<&Value>,
    operator: MatchOperator,
) -> Result<Evaluation, EvaluationError> {
    use MatchOperator::*;

    let plain = |mask: Vec<bool>| Evaluation {
        mask,
        coercions: Vec::new(),
    };

    let required = || value.ok_or(EvaluationError::MissingValue { operator });
    match operator {
        IsEmpty => Ok(plain(cells.iter().map(|c| is_empty_cell(c.as_ref())).collect())),
        IsNotEmpty => Ok(plain(
            cells.iter().map(|c| !is_empty_cell(c.as_ref())).collect(),
        )),
        Equals => Ok(evaluate_equals(cells, required()?)),
        NotEquals => {
            let value = required()?;
            Ok(plain(
                cells
                    .iter()
                    .map(|cell| !cell.as_ref().is_some_and(|c| c.equals_strict(value)))
                    .collect(),
            ))
        }
        Contains | NotContains | StartsWith | EndsWith => {
            let needle = required()?.as_display();
            let hit = |text: &str| match operator {
                Contains | NotContains => text.contains(needle.as_str()),
                StartsWith => text.starts_with(needle.as_str()),
                EndsWith => text.ends_with(needle.as_str()),
                _ => false,
            };
            let mask = cells
                .iter()
                .map(|cell| {
                    let found = cell.as_ref().is_some_and(|c| hit(&c.as_display()));
                    if operator == NotContains { !found } else { found }
                })
                .collect();
            Ok(plain(mask))
        }
        GreaterThan | GreaterEqual | LessThan | LessEqual => {
            let value = required()?;
            let threshold = value.as_number().ok_or_else(|| EvaluationError::NotNumeric {
                operator,
                value: value.as_display(),
            })?;
            let mask = cells
                .iter()
                .map(|cell| {
                    cell.as_ref()
                        .and_then(Value::as_number)
                        .is_some_and(|n| match operator {
                            GreaterThan => n > threshold,
                            GreaterEqual => n >= threshold,
                            LessThan => n < threshold,
                            _ => n <= threshold,
                        })
                })
                .collect();
            Ok(plain(mask))
        }
    }
}

/// Direct comparison first; when that selects nothing, the comparison value is
/// re-typed (text as integer and as float, numbers as text) and every mask is
/// OR-ed together.
fn evaluate_equals(cells: &[Option<Value>], value: &Value) -> Evaluation {
    let direct = mask_where(cells, |cell| cell.equals_strict(value));
    if direct.iter().any(|hit| *hit) {
        return Evaluation {
            mask: direct,
            coercions: Vec::new(),
        };
    }

    let mut combined = direct;
    let mut coercions = Vec::new();
    let mut union = |as_value: Value, mask: Vec<bool>| {
        let matched = mask.iter().filter(|m| **m).count();
        for (slot, hit) in combined.iter_mut().zip(mask) {
            *slot |= hit;
        }
        coercions.push(Coercion { as_value, matched });
    };

    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(int_value) = trimmed.parse::<i64>() {
                let probe = Value::Integer(int_value);
                union(probe.clone(), mask_where(cells, |cell| cell.equals_strict(&probe)));
            }
            if let Ok(float_value) = trimmed.parse::<f64>() {
                let probe = Value::Float(float_value);
                union(probe.clone(), mask_where(cells, |cell| cell.equals_strict(&probe)));
            }
        }
        Value::Integer(_) | Value::Float(_) => {
            let text = value.as_display();
            union(
                Value::String(text.clone()),
                mask_where(cells, |cell| cell.as_display() == text),
            );
        }
        Value::Boolean(_) | Value::Date(_) | Value::DateTime(_) => {}
    }

    Evaluation {
        mask: combined,
        coercions,
    }
}

fn mask_where(cells: &[Option<Value>], predicate: impl Fn(&Value) -> bool) -> Vec<bool> {
    cells
        .iter()
        .map(|cell| cell.as_ref().is_some_and(&predicate))
        .collect()
}
