//! Selection rectangle and keyboard/pointer navigation.
//!
//! The selection is a rectangle plus an active cursor inside it. Stepping
//! the cursor past the rectangle wraps it to the opposite bound and moves it
//! along the other axis, like Tab/Enter in a selected range. Landing on a
//! merge continuation retries the step so the cursor skips over merged
//! regions.
//!
//! Wrapping between axes can cycle forever when every reachable position is
//! a continuation (e.g. a selection covering exactly one merge). Each public
//! step therefore runs on a budget of `2 * (area + 1)` primitive moves; when
//! it runs out the selection is restored and `GridError::NavigationBound` is
//! returned.

use serde::{Deserialize, Serialize};

use crate::cell_id::CellId;
use crate::error::GridError;
use crate::grid::GridStore;
use crate::metrics::ColumnRowMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSelection {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
    /// Cursor row
    pub row_id: usize,
    /// Cursor column
    pub column_id: usize,
}

impl CellSelection {
    /// Single-cell selection at `pos`.
    pub fn at(pos: CellId) -> Self {
        Self {
            left: pos.column,
            top: pos.row,
            right: pos.column,
            bottom: pos.row,
            row_id: pos.row,
            column_id: pos.column,
        }
    }

    /// True when the rectangle is exactly one cell.
    pub fn single(&self) -> bool {
        self.left == self.right && self.top == self.bottom
    }

    pub fn cursor(&self) -> CellId {
        CellId::new(self.column_id, self.row_id)
    }

    pub fn contains(&self, pos: CellId) -> bool {
        (self.left..=self.right).contains(&pos.column) && (self.top..=self.bottom).contains(&pos.row)
    }

    /// Number of cells in the rectangle.
    pub fn area(&self) -> usize {
        (self.right.saturating_sub(self.left) + 1) * (self.bottom.saturating_sub(self.top) + 1)
    }
}

impl std::fmt::Display for CellSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} - {} {}", self.top, self.left, self.bottom, self.right)
    }
}

/// One cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    NextColumn,
    PrevColumn,
    NextRow,
    PrevRow,
}

/// Apply one navigation step to `selection`.
///
/// On error the selection is left exactly as it was.
pub fn navigate(selection: &mut CellSelection, grid: &GridStore, step: Step) -> Result<(), GridError> {
    let before = *selection;
    let mut navigator = Navigator {
        selection,
        grid,
        budget: 2 * (before.area() + 1),
    };

    let result = match step {
        Step::NextColumn => navigator.next_column(),
        Step::PrevColumn => navigator.prev_column(),
        Step::NextRow => navigator.next_row(),
        Step::PrevRow => navigator.prev_row(),
    };

    if result.is_err() {
        log::warn!("selection step {:?} from {} exhausted its budget", step, before.cursor());
        *navigator.selection = before;
    }
    result
}

struct Navigator<'a> {
    selection: &'a mut CellSelection,
    grid: &'a GridStore,
    budget: usize,
}

impl Navigator<'_> {
    fn spend(&mut self) -> Result<(), GridError> {
        if self.budget == 0 {
            return Err(GridError::NavigationBound {
                cell: self.selection.cursor(),
            });
        }
        self.budget -= 1;
        Ok(())
    }

    fn on_continuation(&self) -> bool {
        self.grid.is_continuation(self.selection.cursor())
    }

    fn next_column(&mut self) -> Result<(), GridError> {
        loop {
            self.spend()?;
            self.selection.column_id += 1;

            if self.selection.single() {
                self.selection.left = self.selection.column_id;
                self.selection.right = self.selection.column_id;
                return Ok(());
            }

            if self.selection.column_id > self.selection.right {
                self.selection.column_id = self.selection.left;
                if self.selection.row_id == self.selection.bottom {
                    self.selection.row_id = self.selection.top;
                } else {
                    self.next_row()?;
                }
            }

            if !self.on_continuation() {
                return Ok(());
            }
        }
    }

    fn prev_column(&mut self) -> Result<(), GridError> {
        loop {
            if self.selection.column_id == 0 {
                return Ok(());
            }
            self.spend()?;
            self.selection.column_id -= 1;

            if self.selection.single() {
                self.selection.left = self.selection.column_id;
                self.selection.right = self.selection.column_id;
                return Ok(());
            }

            if self.selection.column_id < self.selection.left {
                self.selection.column_id = self.selection.right;
                if self.selection.row_id == self.selection.top {
                    self.selection.row_id = self.selection.bottom;
                } else {
                    self.prev_row()?;
                }
            }

            if !self.on_continuation() {
                return Ok(());
            }
        }
    }

    fn next_row(&mut self) -> Result<(), GridError> {
        loop {
            self.spend()?;
            self.selection.row_id += 1;

            if self.selection.single() {
                self.selection.top = self.selection.row_id;
                self.selection.bottom = self.selection.row_id;
                return Ok(());
            }

            if self.selection.row_id > self.selection.bottom {
                self.selection.row_id = self.selection.top;
                if self.selection.column_id == self.selection.right {
                    self.selection.column_id = self.selection.left;
                } else {
                    self.next_column()?;
                }
            }

            if !self.on_continuation() {
                return Ok(());
            }
        }
    }

    fn prev_row(&mut self) -> Result<(), GridError> {
        loop {
            if self.selection.row_id == 0 {
                return Ok(());
            }
            self.spend()?;
            self.selection.row_id -= 1;

            if self.selection.single() {
                self.selection.top = self.selection.row_id;
                self.selection.bottom = self.selection.row_id;
                return Ok(());
            }

            if self.selection.row_id < self.selection.top {
                self.selection.row_id = self.selection.bottom;
                if self.selection.column_id == self.selection.left {
                    self.selection.column_id = self.selection.right;
                } else {
                    self.prev_column()?;
                }
            }

            if !self.on_continuation() {
                return Ok(());
            }
        }
    }
}

/// Select the cells between two pointer positions.
///
/// The cursor goes to the cell under `(x1, y1)` (its master when that cell is
/// a merge continuation). The rectangle covers both points and is widened
/// once by the bounds of every stored cell inside it. The widening is a
/// single pass: a merge that only reaches into the widened area is not
/// pulled in.
pub fn select_by_xy(
    grid: &GridStore,
    metrics: &ColumnRowMetrics,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
) -> CellSelection {
    let top_px = y1.min(y2);
    let bottom_px = y1.max(y2);
    let left_px = x1.min(x2);
    let right_px = x1.max(x2);

    let (r1, r2) = (metrics.row_at(top_px), metrics.row_at(bottom_px));
    let (c1, c2) = (metrics.column_at(left_px), metrics.column_at(right_px));
    let (top, bottom) = (r1.min(r2), r1.max(r2));
    let (left, right) = (c1.min(c2), c1.max(c2));

    let mut cursor = CellId::new(metrics.column_at(x1), metrics.row_at(y1));
    if let Some(master) = grid.get(cursor).and_then(|cell| cell.reference) {
        cursor = master;
    }

    let mut f_top = top;
    let mut f_left = left;
    let mut f_bottom = bottom + 1;
    let mut f_right = right + 1;

    for column in left..=right {
        for row in top..=bottom {
            if let Some(bounds) = grid.bounds(CellId::new(column, row)) {
                f_top = f_top.min(bounds.top);
                f_left = f_left.min(bounds.left);
                f_bottom = f_bottom.max(bounds.bottom);
                f_right = f_right.max(bounds.right);
            }
        }
    }

    CellSelection {
        left: f_left,
        top: f_top,
        right: f_right - 1,
        bottom: f_bottom - 1,
        row_id: cursor.row,
        column_id: cursor.column,
    }
}
