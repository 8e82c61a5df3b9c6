//! Engine error type.

use crate::cell_id::CellId;
use crate::recalc::CycleReport;

/// Errors surfaced by grid operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// A cell name or range did not match `^[A-Za-z]+[0-9]+$`.
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    /// A selection step could not find a cell that is not a merge continuation.
    #[error("selection cannot move from {cell}: every reachable cell is a merge continuation")]
    NavigationBound { cell: CellId },

    /// Formula evaluation recursed past the configured depth or hit a cycle.
    #[error("{0}")]
    RecalculationCycle(#[from] CycleReport),

    /// Formula text could not be parsed.
    #[error("formula error: {0}")]
    Formula(String),

    /// A snapshot was structurally inconsistent.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}

impl GridError {
    /// Spreadsheet-style error code stored on a cell whose evaluation failed.
    pub fn code(&self) -> &'static str {
        match self {
            GridError::InvalidReference(_) => "#REF!",
            GridError::RecalculationCycle(_) => "#CYCLE!",
            GridError::Formula(_) => "#ERROR!",
            GridError::NavigationBound { .. } | GridError::Snapshot(_) | GridError::Json(_) => "#ERROR!",
        }
    }
}
