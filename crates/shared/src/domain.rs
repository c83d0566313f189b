use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ROW_LETTERS: &[u8; 8] = b"ABCDEFGH";
pub const ROW_COUNT: u8 = 8;
pub const COLUMN_COUNT: u8 = 12;

/// A sample position on a 96-well microplate.
///
/// Parsed case-insensitively, always stored and serialized canonically
/// (`"A1"`, `"H12"`). Ordering is row-major, then numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellId {
    row: u8,
    column: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WellIdError {
    #[error("'{0}' isn't a valid well name")]
    Malformed(String),
    #[error("well row {0} is outside 1..=8")]
    RowOutOfRange(u8),
    #[error("well column {0} is outside 1..=12")]
    ColumnOutOfRange(u8),
}

impl WellId {
    /// Builds a well from 1-based row and column numbers.
    pub fn new(row: u8, column: u8) -> Result<Self, WellIdError> {
        if !(1..=ROW_COUNT).contains(&row) {
            return Err(WellIdError::RowOutOfRange(row));
        }
        if !(1..=COLUMN_COUNT).contains(&column) {
            return Err(WellIdError::ColumnOutOfRange(column));
        }
        Ok(Self {
            row: row - 1,
            column,
        })
    }

    pub fn row(&self) -> u8 {
        self.row + 1
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    pub fn row_letter(&self) -> char {
        ROW_LETTERS[usize::from(self.row)] as char
    }

    /// Every well on the plate in canonical order.
    pub fn all() -> impl Iterator<Item = WellId> {
        (0..ROW_COUNT).flat_map(|row| (1..=COLUMN_COUNT).map(move |column| WellId { row, column }))
    }
}

impl FromStr for WellId {
    type Err = WellIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || WellIdError::Malformed(raw.to_string());
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(malformed)?.to_ascii_uppercase();
        let row = ROW_LETTERS
            .iter()
            .position(|candidate| *candidate as char == letter)
            .ok_or_else(malformed)?;

        let digits = chars.as_str();
        if digits.is_empty()
            || digits.len() > 2
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        let column: u8 = digits.parse().map_err(|_| malformed())?;
        if column > COLUMN_COUNT {
            return Err(malformed());
        }

        Ok(Self {
            row: row as u8,
            column,
        })
    }
}

impl TryFrom<String> for WellId {
    type Error = WellIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WellId> for String {
    fn from(value: WellId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column)
    }
}

/// Sorts wells row-major, then by numeric column.
pub fn sort_wells(wells: &mut [WellId]) {
    wells.sort_unstable();
}

/// Unique wells in canonical order.
pub fn unique_sorted_wells<'a>(wells: impl IntoIterator<Item = &'a WellId>) -> Vec<WellId> {
    wells
        .into_iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One analyte reading taken from one well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub well: WellId,
    pub analyte: String,
    pub reading: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_lowercase_names() {
        let a1: WellId = "A1".parse().expect("a1");
        assert_eq!(a1.row(), 1);
        assert_eq!(a1.column(), 1);

        let h12: WellId = " h12 ".parse().expect("h12");
        assert_eq!(h12.to_string(), "H12");
        assert_eq!(h12, WellId::new(8, 12).expect("new"));
    }

    #[test]
    fn rejects_malformed_names() {
        for raw in ["", "A", "I1", "A0", "A01", "A13", "A123", "1A", "AA1", "A-1", "A 1"] {
            assert!(
                raw.parse::<WellId>().is_err(),
                "'{raw}' should not parse as a well"
            );
        }
    }

    #[test]
    fn new_checks_ranges() {
        assert_eq!(WellId::new(0, 1), Err(WellIdError::RowOutOfRange(0)));
        assert_eq!(WellId::new(9, 1), Err(WellIdError::RowOutOfRange(9)));
        assert_eq!(WellId::new(1, 13), Err(WellIdError::ColumnOutOfRange(13)));
    }

    #[test]
    fn sorts_row_major_then_numeric_column() {
        let mut wells: Vec<WellId> = ["B1", "A10", "A2", "H12", "A1"]
            .iter()
            .map(|raw| raw.parse().expect("well"))
            .collect();
        sort_wells(&mut wells);
        let names: Vec<String> = wells.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["A1", "A2", "A10", "B1", "H12"]);
    }

    #[test]
    fn all_covers_the_plate_in_order() {
        let wells: Vec<WellId> = WellId::all().collect();
        assert_eq!(wells.len(), 96);
        assert_eq!(wells[0].to_string(), "A1");
        assert_eq!(wells[12].to_string(), "B1");
        assert_eq!(wells[95].to_string(), "H12");
    }

    #[test]
    fn serde_uses_canonical_strings_and_validates() {
        let wells: Vec<WellId> = serde_json::from_str(r#"["a1", "C7"]"#).expect("json");
        assert_eq!(serde_json::to_string(&wells).expect("json"), r#"["A1","C7"]"#);

        let err = serde_json::from_str::<Vec<WellId>>(r#"["A1", "Z9"]"#).expect_err("invalid");
        assert!(err.to_string().contains("Z9"), "unexpected error: {err}");
    }
}
