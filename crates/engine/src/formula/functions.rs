// Built-in spreadsheet functions

use super::eval::{date_serial, evaluate, CellProvider};
use super::parser::Expr;
use crate::cell::CellValue;
use crate::error::GridError;

pub type FunctionImpl = fn(args: &[CellValue]) -> CellValue;

/// Dispatch a function call. `IF` evaluates its arguments lazily; every
/// other function evaluates all of them first.
pub fn call(name: &str, args: &[Expr], provider: &dyn CellProvider) -> Result<CellValue, GridError> {
    match name {
        "IF" => return if_(args, provider),
        "TODAY" => {
            return Ok(no_args(args, || CellValue::Number(date_serial(provider.now()).floor())));
        }
        "NOW" => return Ok(no_args(args, || CellValue::Number(date_serial(provider.now())))),
        _ => {}
    }

    let imp: FunctionImpl = match name {
        "SUM" => sum,
        "AVERAGE" => average,
        "MIN" => min,
        "MAX" => max,
        "COUNT" => count,
        "ABS" => abs,
        "ROUND" => round,
        "CONCAT" => concat,
        _ => return Err(GridError::Formula(format!("unknown function {}", name))),
    };

    let values = args
        .iter()
        .map(|arg| evaluate(arg, provider))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(imp(&values))
}

fn no_args(args: &[Expr], f: impl FnOnce() -> CellValue) -> CellValue {
    if args.is_empty() {
        f()
    } else {
        CellValue::Error("#VALUE!".to_string())
    }
}

fn if_(args: &[Expr], provider: &dyn CellProvider) -> Result<CellValue, GridError> {
    if args.is_empty() || args.len() > 3 {
        return Ok(CellValue::Error("#VALUE!".to_string()));
    }
    let condition = match evaluate(&args[0], provider)? {
        CellValue::Error(e) => return Ok(CellValue::Error(e)),
        CellValue::Boolean(b) => b,
        CellValue::Text(s) if s.eq_ignore_ascii_case("true") => true,
        CellValue::Text(s) if s.eq_ignore_ascii_case("false") || s.is_empty() => false,
        other => match other.to_number() {
            Ok(n) => n != 0.0,
            Err(code) => return Ok(CellValue::Error(code)),
        },
    };
    let branch = if condition { args.get(1) } else { args.get(2) };
    match branch {
        Some(expr) => evaluate(expr, provider),
        None => Ok(CellValue::Boolean(condition)),
    }
}

/// Flatten range arguments into their member values.
fn flatten(args: &[CellValue]) -> impl Iterator<Item = &CellValue> {
    args.iter().flat_map(|arg| match arg {
        CellValue::List(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    })
}

/// Numeric members of the arguments. Text and blanks are skipped, the first
/// error wins.
fn numbers(args: &[CellValue]) -> Result<Vec<f64>, String> {
    let mut out = Vec::new();
    for value in flatten(args) {
        match value {
            CellValue::Number(n) => out.push(*n),
            CellValue::Error(e) => return Err(e.clone()),
            _ => {}
        }
    }
    Ok(out)
}

fn with_numbers(args: &[CellValue], f: impl FnOnce(Vec<f64>) -> CellValue) -> CellValue {
    match numbers(args) {
        Ok(values) => f(values),
        Err(code) => CellValue::Error(code),
    }
}

pub fn sum(args: &[CellValue]) -> CellValue {
    with_numbers(args, |values| CellValue::Number(values.iter().sum()))
}

pub fn average(args: &[CellValue]) -> CellValue {
    with_numbers(args, |values| {
        if values.is_empty() {
            CellValue::Error("#DIV/0!".to_string())
        } else {
            CellValue::Number(values.iter().sum::<f64>() / values.len() as f64)
        }
    })
}

pub fn min(args: &[CellValue]) -> CellValue {
    with_numbers(args, |values| {
        CellValue::Number(values.into_iter().reduce(f64::min).unwrap_or(0.0))
    })
}

pub fn max(args: &[CellValue]) -> CellValue {
    with_numbers(args, |values| {
        CellValue::Number(values.into_iter().reduce(f64::max).unwrap_or(0.0))
    })
}

pub fn count(args: &[CellValue]) -> CellValue {
    let n = flatten(args).filter(|v| matches!(v, CellValue::Number(_))).count();
    CellValue::Number(n as f64)
}

pub fn abs(args: &[CellValue]) -> CellValue {
    match args {
        [value] => match value.to_number() {
            Ok(n) => CellValue::Number(n.abs()),
            Err(code) => CellValue::Error(code),
        },
        _ => CellValue::Error("#VALUE!".to_string()),
    }
}

pub fn round(args: &[CellValue]) -> CellValue {
    let (value, digits) = match args {
        [value] => (value.to_number(), Ok(0.0)),
        [value, digits] => (value.to_number(), digits.to_number()),
        _ => return CellValue::Error("#VALUE!".to_string()),
    };
    match (value, digits) {
        (Ok(n), Ok(d)) => {
            let factor = 10f64.powi(d.trunc() as i32);
            CellValue::Number((n * factor).round() / factor)
        }
        (Err(code), _) | (_, Err(code)) => CellValue::Error(code),
    }
}

pub fn concat(args: &[CellValue]) -> CellValue {
    let mut out = String::new();
    for value in flatten(args) {
        if let CellValue::Error(e) = value {
            return CellValue::Error(e.clone());
        }
        out.push_str(&value.to_text());
    }
    CellValue::Text(out)
}
