//! Sparse cell storage.
//!
//! Cells and per-cell appearance overrides live in maps keyed by `CellId`;
//! a missing key means an empty position. Column and row appearance
//! overrides are kept alongside since they share the same sparse shape.

use rustc_hash::FxHashMap;

use crate::appearance::Appearance;
use crate::cell::Cell;
use crate::cell_id::CellId;

/// Extent of a cell on the grid, right/bottom exclusive.
///
/// For a merge continuation these are the bounds of its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GridStore {
    pub(crate) cells: FxHashMap<CellId, Cell>,
    appearance: FxHashMap<CellId, Appearance>,
    column_appearance: FxHashMap<usize, Appearance>,
    row_appearance: FxHashMap<usize, Appearance>,
}

impl GridStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: CellId) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    pub fn get_mut(&mut self, pos: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(&pos)
    }

    /// Get the cell at `pos`, materializing a blank one if absent.
    pub fn force_get(&mut self, pos: CellId) -> &mut Cell {
        self.cells
            .entry(pos)
            .or_insert_with(|| Cell::new(pos.column, pos.row))
    }

    /// Overwrite the slot at `pos`. The cell's own coordinates are aligned to `pos`.
    pub fn insert(&mut self, pos: CellId, mut cell: Cell) {
        cell.column_id = pos.column;
        cell.row_id = pos.row;
        self.cells.insert(pos, cell);
    }

    pub fn remove(&mut self, pos: CellId) -> Option<Cell> {
        self.cells.remove(&pos)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.appearance.clear();
        self.column_appearance.clear();
        self.row_appearance.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Positions of every stored cell, sorted for deterministic iteration.
    pub fn positions_sorted(&self) -> Vec<CellId> {
        let mut positions: Vec<CellId> = self.cells.keys().copied().collect();
        positions.sort();
        positions
    }

    /// The cell whose content applies at `pos`: the master for a merge
    /// continuation, otherwise the stored cell itself.
    pub fn effective(&self, pos: CellId) -> Option<&Cell> {
        let cell = self.cells.get(&pos)?;
        match cell.reference {
            Some(master) => self.cells.get(&master).or(Some(cell)),
            None => Some(cell),
        }
    }

    /// Bounds covered by the cell at `pos`, if one is stored.
    pub fn bounds(&self, pos: CellId) -> Option<CellBounds> {
        let cell = self.effective(pos)?;
        Some(CellBounds {
            left: cell.column_id,
            top: cell.row_id,
            right: cell.column_id + cell.col_span,
            bottom: cell.row_id + cell.row_span,
        })
    }

    /// True when `pos` holds a merge continuation.
    pub fn is_continuation(&self, pos: CellId) -> bool {
        self.cells.get(&pos).is_some_and(Cell::is_continuation)
    }

    // =========================================================================
    // Appearance overrides
    // =========================================================================

    pub fn cell_appearance(&self, pos: CellId) -> Option<&Appearance> {
        self.appearance.get(&pos)
    }

    pub fn set_cell_appearance(&mut self, pos: CellId, appearance: Appearance) {
        self.appearance.insert(pos, appearance);
    }

    pub fn cell_appearances(&self) -> impl Iterator<Item = (CellId, &Appearance)> + '_ {
        self.appearance.iter().map(|(pos, a)| (*pos, a))
    }

    pub fn column_appearance(&self, column: usize) -> Option<&Appearance> {
        self.column_appearance.get(&column)
    }

    pub fn set_column_appearance(&mut self, column: usize, appearance: Appearance) {
        self.column_appearance.insert(column, appearance);
    }

    pub fn column_appearances(&self) -> impl Iterator<Item = (usize, &Appearance)> + '_ {
        self.column_appearance.iter().map(|(i, a)| (*i, a))
    }

    pub fn row_appearance(&self, row: usize) -> Option<&Appearance> {
        self.row_appearance.get(&row)
    }

    pub fn set_row_appearance(&mut self, row: usize, appearance: Appearance) {
        self.row_appearance.insert(row, appearance);
    }

    pub fn row_appearances(&self) -> impl Iterator<Item = (usize, &Appearance)> + '_ {
        self.row_appearance.iter().map(|(i, a)| (*i, a))
    }
}
