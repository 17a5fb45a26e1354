use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MappingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateKind {
    Single,
    Range,
    Column,
    Row,
}

/// A parsed address. Fields that do not apply to the kind are empty / zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    column: String,
    row: u32,
    end_column: String,
    end_row: u32,
    kind: CoordinateKind,
}

impl Coordinate {
    pub fn parse(text: &str) -> Result<Self> {
        let normalized = text.trim().to_ascii_uppercase();
        if normalized.contains(':') {
            return Self::parse_range(&normalized);
        }
        if is_letters(&normalized) {
            return Ok(Self::whole_column(&normalized));
        }
        if is_digits(&normalized) {
            return Self::row(parse_row(&normalized, &normalized)?);
        }
        Self::parse_single(&normalized)
    }

    pub fn parse_range(text: &str) -> Result<Self> {
        let normalized = text.trim().to_ascii_uppercase();
        let mut parts = normalized.split(':');
        let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(MappingError::format(
                "range",
                text,
                "expected exactly one ':' separator",
            ));
        };
        let (start, end) = (start.trim(), end.trim());

        if is_letters(start) && start == end {
            return Ok(Self::whole_column(start));
        }
        if is_digits(start) && start == end {
            return Self::row(parse_row(start, text)?);
        }

        let first = Self::parse_single(start)
            .map_err(|err| MappingError::format("range", text, err.to_string()))?;
        let last = Self::parse_single(end)
            .map_err(|err| MappingError::format("range", text, err.to_string()))?;
        // A degenerate one-cell range addresses its column, like `A:A`.
        if first == last {
            return Ok(Self::whole_column(&first.column));
        }
        Ok(Coordinate {
            column: first.column,
            row: first.row,
            end_column: last.column,
            end_row: last.row,
            kind: CoordinateKind::Range,
        })
    }

    fn whole_column(letters: &str) -> Self {
        Coordinate {
            column: letters.to_ascii_uppercase(),
            row: 0,
            end_column: String::new(),
            end_row: 0,
            kind: CoordinateKind::Column,
        }
    }

    pub fn row(row: u32) -> Result<Self> {
        if row < 1 {
            return Err(MappingError::format(
                "coordinate",
                row.to_string(),
                "row numbers start at 1",
            ));
        }
        Ok(Coordinate {
            column: String::new(),
            row,
            end_column: String::new(),
            end_row: 0,
            kind: CoordinateKind::Row,
        })
    }

    fn parse_single(text: &str) -> Result<Self> {
        let split = text.find(|c: char| c.is_ascii_digit()).ok_or_else(|| {
            MappingError::format("coordinate", text, "missing row number")
        })?;
        let (letters, digits) = text.split_at(split);
        if !is_letters(letters) {
            return Err(MappingError::format(
                "coordinate",
                text,
                "expected column letters before the row number",
            ));
        }
        if !is_digits(digits) {
            return Err(MappingError::format(
                "coordinate",
                text,
                "expected only digits after the column letters",
            ));
        }
        let row = parse_row(digits, text)?;
        Ok(Coordinate {
            column: letters.to_string(),
            row,
            end_column: String::new(),
            end_row: 0,
            kind: CoordinateKind::Single,
        })
    }

    pub fn kind(&self) -> CoordinateKind {
        self.kind
    }

    /// Column letters, empty for whole-row coordinates.
    pub fn column_letters(&self) -> &str {
        &self.column
    }

    /// 1-based row number, `None` for whole-column coordinates.
    pub fn row_number(&self) -> Option<u32> {
        (self.row > 0).then_some(self.row)
    }

    pub fn end_column_letters(&self) -> Option<&str> {
        (!self.end_column.is_empty()).then_some(self.end_column.as_str())
    }

    pub fn end_row_number(&self) -> Option<u32> {
        (self.end_row > 0).then_some(self.end_row)
    }

    /// Zero-based column index for the kinds the mapping engine accepts
    /// (`Column` and `Single`). Ranges and rows have no single column.
    pub fn column_index(&self) -> Result<usize> {
        match self.kind {
            CoordinateKind::Column | CoordinateKind::Single => Ok(to_index(&self.column)),
            CoordinateKind::Range | CoordinateKind::Row => Err(MappingError::format(
                "coordinate",
                self.to_string(),
                "only column or single-cell coordinates address a column",
            )),
        }
    }

    /// Zero-based (row, column) position of a single cell.
    pub fn cell_position(&self) -> Option<(usize, usize)> {
        match self.kind {
            CoordinateKind::Single => Some((self.row as usize - 1, to_index(&self.column))),
            _ => None,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CoordinateKind::Single => write!(f, "{}{}", self.column, self.row),
            CoordinateKind::Range => write!(
                f,
                "{}{}:{}{}",
                self.column, self.row, self.end_column, self.end_row
            ),
            CoordinateKind::Column => f.write_str(&self.column),
            CoordinateKind::Row => write!(f, "{}", self.row),
        }
    }
}

impl FromStr for Coordinate {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self> {
        Coordinate::parse(s)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Coordinate::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Zero-based index of upper-case column letters (`A` = 0, `AA` = 26).
///
/// Callers are expected to pass letters accepted by [`Coordinate::parse`].
pub fn to_index(column: &str) -> usize {
    column
        .bytes()
        .fold(0usize, |acc, b| {
            acc.saturating_mul(26)
                .saturating_add(usize::from(b.to_ascii_uppercase() - b'A') + 1)
        })
        .saturating_sub(1)
}

/// Column letters for a zero-based index (0 = `A`, 26 = `AA`).
pub fn to_column_letters(index: usize) -> String {
    let mut remaining = index.saturating_add(1);
    let mut letters = Vec::new();
    while remaining > 0 {
        let rem = (remaining - 1) % 26;
        letters.push(b'A' + rem as u8);
        remaining = (remaining - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn is_letters(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_row(digits: &str, input: &str) -> Result<u32> {
    let row: u32 = digits
        .parse()
        .map_err(|_| MappingError::format("coordinate", input, format!("row '{digits}' is not a valid number")))?;
    if row < 1 {
        return Err(MappingError::format(
            "coordinate",
            input,
            "row numbers start at 1",
        ));
    }
    Ok(row)
}
