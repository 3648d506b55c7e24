use std::{fmt::Formatter, num::ParseIntError, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

/// 1-based column number (`A` = 1).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(u32);

/// 1-based row number, as written in A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row(u32);

impl Column {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Row {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", number_to_letters(self.0))
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Column(u32: {}, letters: {})", self.0, self)
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversions: Others -> Column / Row

impl From<u32> for Column {
    fn from(value: u32) -> Self {
        Column(value)
    }
}

impl From<u32> for Row {
    fn from(value: u32) -> Self {
        Row(value)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnParseError {
    #[error("Non-alphabetic character in column")]
    NonAlphabeticCharacter,
    #[error("Empty column")]
    Empty,
    #[error("Column is out of range")]
    OutOfRange,
}

impl FromStr for Column {
    type Err = ColumnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_col(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowParseError {
    #[error("Row is not a number: {0}")]
    NotANumber(ParseIntError),
    #[error("Row numbers start at 1")]
    Zero,
}

impl FromStr for Row {
    type Err = RowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u32>().map_err(RowParseError::NotANumber)? {
            0 => Err(RowParseError::Zero),
            row => Ok(Row(row)),
        }
    }
}

pub fn parse_col<T: AsRef<str>>(col_str: T) -> Result<Column, ColumnParseError> {
    let col_str = col_str.as_ref();
    if col_str.is_empty() {
        return Err(ColumnParseError::Empty);
    }
    if col_str.chars().any(|c| !c.is_ascii_alphabetic()) {
        return Err(ColumnParseError::NonAlphabeticCharacter);
    }

    col_str
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .try_fold(0u32, |acc, c| {
            acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)
        })
        .map(Column)
        .ok_or(ColumnParseError::OutOfRange)
}

fn number_to_letters(number: u32) -> String {
    let mut number = number;
    let mut result = String::new();
    while number > 0 {
        let remainder = (number - 1) % 26;
        let letter = (remainder as u8 + b'A') as char;
        result.push(letter);
        number = (number - remainder) / 26;
    }
    result.chars().rev().collect()
}

/// A single cell address such as `B22`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct CellPosition {
    pub col: Column,
    pub row: Row,
}

impl PartialOrd for CellPosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Row-major order, the order cells appear in a worksheet.
impl Ord for CellPosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellPositionParseError {
    #[error("Error parsing column: {0}")]
    ColumnParseError(ColumnParseError),
    #[error("Error parsing row: {0}")]
    RowParseError(RowParseError),
    #[error("Missing row number in {0:?}")]
    MissingRow(String),
}

impl FromStr for CellPosition {
    type Err = CellPositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('$');
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '$')
            .ok_or_else(|| CellPositionParseError::MissingRow(s.to_owned()))?;
        let (col, row) = s.split_at(split);
        Ok(CellPosition {
            col: col
                .parse()
                .map_err(CellPositionParseError::ColumnParseError)?,
            row: row
                .trim_start_matches('$')
                .parse()
                .map_err(CellPositionParseError::RowParseError)?,
        })
    }
}

impl TryFrom<String> for CellPosition {
    type Error = CellPositionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for CellPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.col, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_letter() {
        assert_eq!(number_to_letters(1), "A");
        assert_eq!(number_to_letters(13), "M");
        assert_eq!(number_to_letters(26), "Z");
        assert_eq!(number_to_letters(27), "AA");
        assert_eq!(number_to_letters(52), "AZ");
        assert_eq!(number_to_letters(53), "BA");
        assert_eq!(number_to_letters(702), "ZZ");
        assert_eq!(number_to_letters(703), "AAA");
    }

    #[test]
    fn test_parse_col() {
        assert_eq!(parse_col("A").unwrap(), Column(1));
        assert_eq!(parse_col("b").unwrap(), Column(2));
        assert_eq!(parse_col("M").unwrap(), Column(13));
        assert_eq!(parse_col("AA").unwrap(), Column(27));
        assert_eq!(parse_col("ZZ").unwrap(), Column(702));
        assert_eq!(
            parse_col("A1").err().unwrap(),
            ColumnParseError::NonAlphabeticCharacter
        );
        assert_eq!(parse_col("").err().unwrap(), ColumnParseError::Empty);
        assert_eq!(
            parse_col("ZZZZZZZZZZ").err().unwrap(),
            ColumnParseError::OutOfRange
        );
    }

    #[test]
    fn test_row_from_str() {
        assert_eq!(Row::from_str("1").unwrap(), Row(1));
        assert_eq!(Row::from_str("100").unwrap(), Row(100));
        assert_eq!(Row::from_str("0").err().unwrap(), RowParseError::Zero);
        assert!(Row::from_str("1a").is_err());
    }

    #[test]
    fn test_cell_position_from_str() {
        let cell: CellPosition = "B22".parse().unwrap();
        assert_eq!(cell.col, Column(2));
        assert_eq!(cell.row, Row(22));

        let absolute: CellPosition = "$M$22".parse().unwrap();
        assert_eq!(absolute.col, Column(13));
        assert_eq!(absolute.row, Row(22));
    }

    #[test]
    fn test_cell_position_from_str_errors() {
        assert!(matches!(
            "B".parse::<CellPosition>(),
            Err(CellPositionParseError::MissingRow(_))
        ));
        assert!(matches!(
            "22".parse::<CellPosition>(),
            Err(CellPositionParseError::ColumnParseError(
                ColumnParseError::Empty
            ))
        ));
        assert!(matches!(
            "B0".parse::<CellPosition>(),
            Err(CellPositionParseError::RowParseError(RowParseError::Zero))
        ));
    }

    #[test]
    fn test_cell_position_display() {
        let cell = CellPosition {
            col: Column(702),
            row: Row(100),
        };
        assert_eq!(cell.to_string(), "ZZ100");
    }

    #[test]
    fn test_cell_positions_sort_row_major() {
        let mut cells: Vec<CellPosition> = ["M22", "B23", "B22", "A30"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        cells.sort();
        let names: Vec<String> = cells.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["B22", "M22", "B23", "A30"]);
    }

    #[test]
    fn test_cell_position_deserializes_from_string() {
        let cell: CellPosition = serde_json::from_str("\"M22\"").unwrap();
        assert_eq!(cell, "M22".parse().unwrap());
        assert!(serde_json::from_str::<CellPosition>("\"22M\"").is_err());
    }
}
