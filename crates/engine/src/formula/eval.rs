// Formula evaluation
//
// The sheet hands an evaluator a `CellProvider`, which resolves cell
// references to values and supplies the current date/time. Evaluators never
// touch sheet storage directly.

use chrono::NaiveDateTime;

use super::functions;
use super::parser::{self, Expr, Op};
use crate::cell::CellValue;
use crate::cell_id::CellId;
use crate::error::GridError;

/// Source of cell values and date context for formula evaluation.
pub trait CellProvider {
    /// Value of the cell at `pos`; empty positions yield `CellValue::Empty`.
    fn cell_value(&self, pos: CellId) -> Result<CellValue, GridError>;

    /// Current local date and time, for TODAY/NOW.
    fn now(&self) -> NaiveDateTime;

    /// Values of a rectangular range, column by column. An inverted range is empty.
    fn range_values(&self, start: CellId, end: CellId) -> Result<Vec<CellValue>, GridError> {
        let mut values = Vec::new();
        for column in start.column..=end.column {
            for row in start.row..=end.row {
                values.push(self.cell_value(CellId::new(column, row))?);
            }
        }
        Ok(values)
    }

    /// Resolve a name such as `B12` or a range such as `A1:B3`.
    fn value_by_name(&self, name: &str) -> Result<CellValue, GridError> {
        match name.split_once(':') {
            Some((start, end)) => {
                let start = CellId::parse(start.trim())?;
                let end = CellId::parse(end.trim())?;
                Ok(CellValue::List(self.range_values(start, end)?))
            }
            None => self.cell_value(CellId::parse(name.trim())?),
        }
    }
}

/// Turns formula text into a value.
pub trait Evaluator {
    /// Evaluate `formula` (which starts with `=`) against `provider`.
    fn evaluate(&self, provider: &dyn CellProvider, formula: &str) -> Result<CellValue, GridError>;

    /// Cells `formula` reads, used to order recalculation.
    fn references(&self, formula: &str) -> Result<Vec<CellId>, GridError>;
}

/// Built-in evaluator for the formula subset the grid supports.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaEvaluator;

impl Evaluator for FormulaEvaluator {
    fn evaluate(&self, provider: &dyn CellProvider, formula: &str) -> Result<CellValue, GridError> {
        let expr = parser::parse(formula)?;
        evaluate(&expr, provider)
    }

    fn references(&self, formula: &str) -> Result<Vec<CellId>, GridError> {
        Ok(parser::parse(formula)?.references())
    }
}

/// Evaluate an expression.
///
/// Spreadsheet-level failures (`#DIV/0!`, `#VALUE!`) come back as
/// `CellValue::Error`; only reference and cycle failures from the provider
/// are returned as `Err`.
pub fn evaluate(expr: &Expr, provider: &dyn CellProvider) -> Result<CellValue, GridError> {
    match expr {
        Expr::Number(n) => Ok(CellValue::Number(*n)),
        Expr::Text(s) => Ok(CellValue::Text(s.clone())),
        Expr::Boolean(b) => Ok(CellValue::Boolean(*b)),
        Expr::CellRef(cell) => match provider.cell_value(*cell)? {
            // A reference to a range-valued cell reads as its first value
            CellValue::List(items) => Ok(items.into_iter().next().unwrap_or_default()),
            value => Ok(value),
        },
        Expr::Range { start, end } => Ok(CellValue::List(provider.range_values(*start, *end)?)),
        Expr::Function { name, args } => functions::call(name, args, provider),
        Expr::Negate(inner) => {
            let value = evaluate(inner, provider)?;
            Ok(match value.to_number() {
                Ok(n) => CellValue::Number(-n),
                Err(code) => CellValue::Error(code),
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let left = evaluate(left, provider)?;
            let right = evaluate(right, provider)?;
            Ok(binary_op(*op, &left, &right))
        }
    }
}

fn binary_op(op: Op, left: &CellValue, right: &CellValue) -> CellValue {
    if let CellValue::Error(e) = left {
        return CellValue::Error(e.clone());
    }
    if let CellValue::Error(e) = right {
        return CellValue::Error(e.clone());
    }

    match op {
        Op::Concat => CellValue::Text(format!("{}{}", left.to_text(), right.to_text())),
        Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => {
            let ordering = compare(left, right);
            let result = match op {
                Op::Lt => ordering.is_lt(),
                Op::Gt => ordering.is_gt(),
                Op::Eq => ordering.is_eq(),
                Op::LtEq => ordering.is_le(),
                Op::GtEq => ordering.is_ge(),
                _ => ordering.is_ne(),
            };
            CellValue::Boolean(result)
        }
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => {
            let (a, b) = match (left.to_number(), right.to_number()) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(code), _) | (_, Err(code)) => return CellValue::Error(code),
            };
            let result = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => {
                    if b == 0.0 {
                        return CellValue::Error("#DIV/0!".to_string());
                    }
                    a / b
                }
                _ => a.powf(b),
            };
            if result.is_finite() {
                CellValue::Number(result)
            } else {
                CellValue::Error("#NUM!".to_string())
            }
        }
    }
}

/// Numbers compare numerically, anything else compares as case-insensitive text.
fn compare(left: &CellValue, right: &CellValue) -> std::cmp::Ordering {
    match (left, right) {
        (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
        _ => left.to_text().to_lowercase().cmp(&right.to_text().to_lowercase()),
    }
}

/// Excel-style serial date: days since 1899-12-30, fraction for time of day.
pub fn date_serial(at: NaiveDateTime) -> f64 {
    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let elapsed = at - epoch;
    elapsed.num_seconds() as f64 / 86_400.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    /// Fixed-value provider for evaluator tests.
    #[derive(Default)]
    pub(crate) struct MapProvider {
        pub values: FxHashMap<CellId, CellValue>,
    }

    impl MapProvider {
        pub fn with(mut self, name: &str, value: CellValue) -> Self {
            self.values.insert(CellId::parse(name).unwrap(), value);
            self
        }
    }

    impl CellProvider for MapProvider {
        fn cell_value(&self, pos: CellId) -> Result<CellValue, GridError> {
            Ok(self.values.get(&pos).cloned().unwrap_or_default())
        }

        fn now(&self) -> NaiveDateTime {
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap()
        }
    }

    fn eval(provider: &MapProvider, formula: &str) -> CellValue {
        FormulaEvaluator.evaluate(provider, formula).unwrap()
    }

    #[test]
    fn test_arithmetic_with_references() {
        let p = MapProvider::default()
            .with("A1", CellValue::Number(10.0))
            .with("B1", CellValue::Text("2".into()));
        assert_eq!(eval(&p, "=A1+1"), CellValue::Number(11.0));
        assert_eq!(eval(&p, "=A1*B1-3"), CellValue::Number(17.0));
        assert_eq!(eval(&p, "=-A1^2"), CellValue::Number(100.0));
        assert_eq!(eval(&p, "=(1+2)*3"), CellValue::Number(9.0));
        assert_eq!(eval(&p, "=Z99+1"), CellValue::Number(1.0));
    }

    #[test]
    fn test_error_values() {
        let p = MapProvider::default().with("A1", CellValue::Text("abc".into()));
        assert_eq!(eval(&p, "=1/0"), CellValue::Error("#DIV/0!".into()));
        assert_eq!(eval(&p, "=A1+1"), CellValue::Error("#VALUE!".into()));
        assert_eq!(eval(&p, "=(1/0)&\"x\""), CellValue::Error("#DIV/0!".into()));
    }

    #[test]
    fn test_text_and_comparison() {
        let p = MapProvider::default().with("A1", CellValue::Text("Hi".into()));
        assert_eq!(eval(&p, "=A1&\" there\""), CellValue::Text("Hi there".into()));
        assert_eq!(eval(&p, "=A1=\"hi\""), CellValue::Boolean(true));
        assert_eq!(eval(&p, "=2<10"), CellValue::Boolean(true));
        assert_eq!(eval(&p, "=3<>3"), CellValue::Boolean(false));
    }

    #[test]
    fn test_value_by_name() {
        let p = MapProvider::default()
            .with("A1", CellValue::Number(1.0))
            .with("A2", CellValue::Number(2.0))
            .with("B1", CellValue::Number(3.0));
        assert_eq!(p.value_by_name("B1").unwrap(), CellValue::Number(3.0));
        assert_eq!(
            p.value_by_name("A1:B2").unwrap(),
            CellValue::List(vec![
                CellValue::Number(1.0),
                CellValue::Number(2.0),
                CellValue::Number(3.0),
                CellValue::Empty,
            ])
        );
        assert!(matches!(p.value_by_name("A1:9"), Err(GridError::InvalidReference(_))));
        assert!(matches!(p.value_by_name("?"), Err(GridError::InvalidReference(_))));
    }

    #[test]
    fn test_references() {
        assert_eq!(
            FormulaEvaluator.references("=A1+SUM(B1:B2)").unwrap(),
            vec![CellId::new(0, 0), CellId::new(1, 0), CellId::new(1, 1)]
        );
    }

    #[test]
    fn test_date_serial() {
        let at = chrono::NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        assert_eq!(date_serial(at), 2.5);
    }
}
