//! Merged regions.
//!
//! A merge is a master cell with spans greater than 1x1 plus a continuation
//! cell at every other position of its rectangle. Continuations keep
//! whatever content they held, but defer to the master while merged.

use crate::cell_id::CellId;
use crate::grid::GridStore;

impl GridStore {
    /// Merge the `width` x `height` rectangle whose top-left is `pos`.
    ///
    /// Every position in the rectangle is materialized; previous references at
    /// continuation positions are overwritten. Merges mastered inside the
    /// rectangle are dissolved first so none of their continuations is left
    /// pointing at a cell that stops being a master.
    pub fn merge(&mut self, pos: CellId, width: usize, height: usize) {
        let width = width.max(1);
        let height = height.max(1);

        let nested: Vec<CellId> = (pos.column..pos.column + width)
            .flat_map(|column| (pos.row..pos.row + height).map(move |row| CellId::new(column, row)))
            .filter(|at| self.get(*at).is_some_and(|cell| cell.is_merge_master()))
            .collect();
        for at in nested {
            self.unmerge(at);
        }

        let master = self.force_get(pos);
        master.col_span = width;
        master.row_span = height;
        master.reference = None;

        for column in pos.column..pos.column + width {
            for row in pos.row..pos.row + height {
                let at = CellId::new(column, row);
                if at == pos {
                    continue;
                }
                let cell = self.force_get(at);
                cell.reference = Some(pos);
                cell.col_span = 1;
                cell.row_span = 1;
            }
        }
    }

    /// Dissolve the merge mastered at `pos`.
    ///
    /// Returns false (and does nothing) when no cell is stored at `pos` or it
    /// already spans a single cell.
    pub fn unmerge(&mut self, pos: CellId) -> bool {
        let (width, height) = match self.get(pos) {
            Some(cell) if cell.col_span > 1 || cell.row_span > 1 => (cell.col_span, cell.row_span),
            _ => return false,
        };

        for column in pos.column..pos.column + width {
            for row in pos.row..pos.row + height {
                if let Some(cell) = self.get_mut(CellId::new(column, row)) {
                    cell.reference = None;
                }
            }
        }

        if let Some(master) = self.get_mut(pos) {
            master.col_span = 1;
            master.row_span = 1;
        }
        true
    }

    /// Masters of all merged regions.
    pub fn merge_masters(&self) -> impl Iterator<Item = &crate::cell::Cell> + '_ {
        self.cells.values().filter(|cell| cell.is_merge_master())
    }

    /// Move a scroll origin forward until neither coordinate lies strictly
    /// inside the span of a merge that starts before it.
    pub fn snap_out_of_merges(&self, column: usize, row: usize) -> (usize, usize) {
        let column = snap_axis(column, || {
            self.merge_masters().map(|m| (m.column_id, m.column_id + m.col_span))
        });
        let row = snap_axis(row, || {
            self.merge_masters().map(|m| (m.row_id, m.row_id + m.row_span))
        });
        (column, row)
    }
}

/// Push `index` to the end of any `(start, end)` span that strictly contains
/// it, repeating until it sits inside none. Terminates because `index` only
/// grows and spans are finite.
fn snap_axis<I, F>(mut index: usize, spans: F) -> usize
where
    I: Iterator<Item = (usize, usize)>,
    F: Fn() -> I,
{
    while let Some(end) = spans()
        .filter(|&(start, end)| start < index && index < end)
        .map(|(_, end)| end)
        .max()
    {
        index = end;
    }
    index
}
