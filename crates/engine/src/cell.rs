use serde::{Deserialize, Serialize};

use super::cell_id::CellId;

/// Result of evaluating a cell or formula.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Spreadsheet error code such as `#DIV/0!` or `#CYCLE!`
    Error(String),
    /// Values of a range, column by column
    List(Vec<CellValue>),
}

impl CellValue {
    /// Interpret raw, non-formula input. Numeric text becomes a number.
    pub fn from_literal(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(input.to_string()),
        }
    }

    /// Numeric view used by arithmetic. Errors carry their code.
    pub fn to_number(&self) -> Result<f64, String> {
        match self {
            CellValue::Empty => Ok(0.0),
            CellValue::Number(n) => Ok(*n),
            CellValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse().map_err(|_| "#VALUE!".to_string()),
            CellValue::Error(e) => Err(e.clone()),
            CellValue::List(_) => Err("#VALUE!".to_string()),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::List(items) => items.iter().map(CellValue::to_text).collect::<Vec<_>>().join(","),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn one() -> usize {
    1
}

fn is_one(n: &usize) -> bool {
    *n == 1
}

/// Content of one grid position.
///
/// A cell whose `reference` is set is a merge continuation: it defers its
/// content and spans to the master cell at that position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub column_id: usize,
    pub row_id: usize,
    /// Raw input; formulas start with `=`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Last evaluated value of a formula
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated: Option<CellValue>,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub col_span: usize,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub row_span: usize,
    /// Master cell position when this cell is a merge continuation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<CellId>,
}

impl Cell {
    pub fn new(column_id: usize, row_id: usize) -> Self {
        Self {
            column_id,
            row_id,
            value: None,
            evaluated: None,
            col_span: 1,
            row_span: 1,
            reference: None,
        }
    }

    pub fn id(&self) -> CellId {
        CellId::new(self.column_id, self.row_id)
    }

    /// True when this position defers to a merge master
    pub fn is_continuation(&self) -> bool {
        self.reference.is_some()
    }

    /// True when this cell is the master of a merged region
    pub fn is_merge_master(&self) -> bool {
        self.reference.is_none() && (self.col_span > 1 || self.row_span > 1)
    }

    pub fn is_formula(&self) -> bool {
        self.value.as_deref().is_some_and(|v| v.starts_with('='))
    }

    /// Store raw input and its evaluated value together.
    pub fn update(&mut self, value: String, evaluated: Option<CellValue>) {
        self.value = Some(value);
        self.evaluated = evaluated;
    }

    /// What a renderer shows: the evaluated value for formulas, else the raw text.
    pub fn display_value(&self) -> String {
        match (&self.evaluated, &self.value) {
            (Some(evaluated), _) => evaluated.to_text(),
            (None, Some(raw)) => raw.clone(),
            (None, None) => String::new(),
        }
    }
}
