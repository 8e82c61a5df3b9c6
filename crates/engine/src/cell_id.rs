//! Cell identity and A1-style naming.
//!
//! A `CellId` is a (column, row) position in the grid. Both coordinates are
//! 0-based; the textual form uses bijective base-26 column letters and a
//! 1-based row number (`A1` is `(0, 0)`, `AA10` is `(26, 9)`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Position of a cell in the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellId {
    /// Column index (0-based)
    pub column: usize,
    /// Row index (0-based)
    pub row: usize,
}

impl CellId {
    /// Create a new CellId.
    #[inline]
    pub fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }

    /// Parse a cell name such as `B12` or `aa3`.
    ///
    /// The name must match `^[A-Za-z]+[0-9]+$` and the row number must be at
    /// least 1.
    pub fn parse(name: &str) -> Result<Self, GridError> {
        let invalid = || GridError::InvalidReference(name.to_string());

        let split = name
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(invalid)?;
        let (letters, digits) = name.split_at(split);
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let column = decode_column_name(letters)?;
        let row: usize = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }

        Ok(Self::new(column, row - 1))
    }

    /// The A1-style name of this cell.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", encode_column_name(self.column), self.row + 1)
    }
}

impl FromStr for CellId {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Convert 0-based column index to letter(s): 0=A, 1=B, ..., 25=Z, 26=AA, etc.
pub fn encode_column_name(column: usize) -> String {
    let mut result = String::new();
    let mut n = column;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letter(s) back to a 0-based index. Lowercase is accepted.
pub fn decode_column_name(name: &str) -> Result<usize, GridError> {
    let invalid = || GridError::InvalidReference(name.to_string());
    if name.is_empty() {
        return Err(invalid());
    }

    let mut sum: usize = 0;
    for ch in name.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(invalid());
        }
        let digit = (ch.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        sum = sum
            .checked_mul(26)
            .and_then(|s| s.checked_add(digit))
            .ok_or_else(invalid)?;
    }
    Ok(sum - 1)
}
