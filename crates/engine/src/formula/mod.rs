// Formula parsing and evaluation

pub mod eval;
pub mod functions;
pub mod parser;

pub use eval::{CellProvider, Evaluator, FormulaEvaluator};
