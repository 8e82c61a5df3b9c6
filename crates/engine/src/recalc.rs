//! Recalculation types and reporting.
//!
//! A sheet recomputes its formulas either by a full rescan of every stored
//! formula (the default after each edit) or in dependency order using
//! [`DepGraph`](crate::dep_graph::DepGraph). Both produce a [`RecalcReport`].

use crate::cell_id::CellId;

/// Errors beyond this count are dropped from a report.
pub const MAX_REPORTED_ERRORS: usize = 100;

/// How a recompute walked the sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecalcMode {
    /// Every formula, in row-major position order.
    #[default]
    Full,
    /// Formulas in topological order of their references.
    Ordered,
}

impl RecalcMode {
    fn tag(self) -> &'static str {
        match self {
            RecalcMode::Full => "full",
            RecalcMode::Ordered => "ordered",
        }
    }
}

/// Report from a recompute pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    pub mode: RecalcMode,

    /// Time taken in milliseconds.
    pub duration_ms: u64,

    /// Number of formula cells that were recomputed.
    pub cells_recomputed: usize,

    /// Longest reference chain between formulas (ordered mode only).
    pub max_depth: usize,

    /// True if cycles were detected. Cycle cells hold `#CYCLE!`.
    pub had_cycles: bool,

    /// Errors encountered during recompute (truncated to `MAX_REPORTED_ERRORS`).
    pub errors: Vec<RecalcError>,
}

impl RecalcReport {
    pub fn new(mode: RecalcMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub(crate) fn push_error(&mut self, error: RecalcError) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(error);
        }
    }

    /// Format as a concise one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} cells in {}ms, depth={}, cycles={}, errors={}",
            self.cells_recomputed,
            self.duration_ms,
            self.max_depth,
            self.had_cycles,
            self.errors.len()
        )
    }

    /// Format as a one-line log entry.
    ///
    /// Format: `[recalc/full]   14ms  628 cells  depth=0  cycles=0  errors=0`
    pub fn log_line(&self) -> String {
        format!(
            "[recalc/{}] {:>4}ms  {} cells  depth={}  cycles={}  errors={}",
            self.mode.tag(),
            self.duration_ms,
            self.cells_recomputed,
            self.max_depth,
            if self.had_cycles { 1 } else { 0 },
            self.errors.len()
        )
    }
}

/// An error that occurred during recomputation of a specific cell.
#[derive(Debug, Clone)]
pub struct RecalcError {
    pub cell: CellId,
    pub error: String,
}

impl RecalcError {
    pub fn new(cell: CellId, error: impl Into<String>) -> Self {
        Self {
            cell,
            error: error.into(),
        }
    }
}

/// Report when evaluation runs into a circular reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Cells participating in the cycle.
    /// May be a subset for large cycles.
    pub cells: Vec<CellId>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    pub fn new(cells: Vec<CellId>, message: impl Into<String>) -> Self {
        Self {
            cells,
            message: message.into(),
        }
    }

    /// Create a cycle report for a self-referencing cell.
    pub fn self_reference(cell: CellId) -> Self {
        Self {
            cells: vec![cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Create a cycle report for a multi-cell cycle.
    pub fn cycle(cells: Vec<CellId>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = match cell_list.as_slice() {
            [first, .., last] if cells.len() > 5 => format!(
                "Circular reference involving {} cells: {} → ... → {}",
                cells.len(),
                first,
                last
            ),
            _ => format!("Circular reference: {}", cell_list.join(" → ")),
        };
        Self { cells, message }
    }

    /// Evaluation nested deeper than `limit` starting from `cell`.
    pub fn depth_exceeded(cell: CellId, limit: usize) -> Self {
        Self {
            cells: vec![cell],
            message: format!(
                "Circular reference: evaluating {} exceeded {} nested references",
                cell, limit
            ),
        }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleReport {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(column: usize, row: usize) -> CellId {
        CellId::new(column, row)
    }

    #[test]
    fn test_recalc_report_default() {
        let report = RecalcReport::default();
        assert_eq!(report.mode, RecalcMode::Full);
        assert_eq!(report.duration_ms, 0);
        assert_eq!(report.cells_recomputed, 0);
        assert!(!report.had_cycles);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_recalc_report_summary() {
        let report = RecalcReport {
            duration_ms: 42,
            cells_recomputed: 100,
            max_depth: 5,
            ..RecalcReport::new(RecalcMode::Ordered)
        };
        assert_eq!(report.summary(), "100 cells in 42ms, depth=5, cycles=false, errors=0");
    }

    #[test]
    fn test_recalc_report_log_line() {
        let report = RecalcReport {
            duration_ms: 14,
            cells_recomputed: 628,
            ..RecalcReport::new(RecalcMode::Full)
        };
        assert_eq!(
            report.log_line(),
            "[recalc/full]   14ms  628 cells  depth=0  cycles=0  errors=0"
        );
    }

    #[test]
    fn test_recalc_report_log_line_with_cycles() {
        let mut report = RecalcReport {
            duration_ms: 5,
            cells_recomputed: 10,
            max_depth: 2,
            had_cycles: true,
            ..RecalcReport::new(RecalcMode::Ordered)
        };
        report.push_error(RecalcError::new(cell(0, 0), "test error"));
        assert_eq!(
            report.log_line(),
            "[recalc/ordered]    5ms  10 cells  depth=2  cycles=1  errors=1"
        );
    }

    #[test]
    fn test_error_list_is_capped() {
        let mut report = RecalcReport::default();
        for row in 0..MAX_REPORTED_ERRORS + 20 {
            report.push_error(RecalcError::new(cell(0, row), "#REF!"));
        }
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_cycle_report_self_reference() {
        let report = CycleReport::self_reference(cell(0, 0));
        assert_eq!(report.cells.len(), 1);
        assert_eq!(report.message, "Cell A1 references itself");
    }

    #[test]
    fn test_cycle_report_small_cycle() {
        let report = CycleReport::cycle(vec![cell(0, 0), cell(1, 0), cell(2, 0)]);
        assert_eq!(report.message, "Circular reference: A1 → B1 → C1");
    }

    #[test]
    fn test_cycle_report_large_cycle() {
        let cells: Vec<CellId> = (0..10).map(|i| cell(0, i)).collect();
        let report = CycleReport::cycle(cells);
        assert!(report.message.contains("..."));
        assert!(report.message.contains("10 cells"));
        assert!(report.message.ends_with("A10"));
    }

    #[test]
    fn test_depth_exceeded() {
        let report = CycleReport::depth_exceeded(cell(1, 1), 256);
        assert!(report.message.contains("B2"));
        assert!(report.message.contains("256"));
    }
}
