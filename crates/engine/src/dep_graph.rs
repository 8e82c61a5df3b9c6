//! Dependency graph for formula cells.
//!
//! Tracks precedents (cells a formula reads) and dependents (formulas that
//! read a given cell). Used by ordered recalculation.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (A is a precedent of B)
//! ```

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell_id::CellId;
use crate::recalc::CycleReport;

/// Row-major ordering key, matching how the grid lists cells.
fn row_major(cell: &CellId) -> (usize, usize) {
    (cell.row, cell.column)
}

/// Dependency graph for formula cells.
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ preds[B] then B ∈ succs[A], and vice versa.
/// 2. **No dangling entries:** Empty successor sets are removed, not stored.
/// 3. **Every formula is a node:** a formula with no references still has an
///    (empty) entry in `preds`.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// B -> {A1, A2, ...}: the cells formula B reads.
    preds: FxHashMap<CellId, FxHashSet<CellId>>,

    /// A -> {B1, B2, ...}: the formulas that read A.
    succs: FxHashMap<CellId, FxHashSet<CellId>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells this formula cell depends on.
    pub fn precedents(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Formula cells that depend on this cell.
    pub fn dependents(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Register `formula_cell` with the given precedents, replacing any
    /// previous edges.
    pub fn set_formula(&mut self, formula_cell: CellId, new_preds: FxHashSet<CellId>) {
        self.unlink(formula_cell);
        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(formula_cell);
        }
        self.preds.insert(formula_cell, new_preds);
    }

    fn unlink(&mut self, formula_cell: CellId) {
        if let Some(old_preds) = self.preds.remove(&formula_cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&formula_cell);
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }
    }

    /// Compute topological order of all formula cells, with the dependency
    /// depth of each.
    ///
    /// Precedents come before dependents; ties break in row-major order.
    /// A formula reading no other formula has depth 1. Only edges between
    /// formula cells count.
    ///
    /// Returns `Err(CycleReport)` naming every formula that could not be
    /// ordered: cycle members and everything downstream of them.
    pub fn topo_order_all_formulas(&self) -> Result<Vec<(CellId, usize)>, CycleReport> {
        let formula_count = self.preds.len();
        let mut in_degree: FxHashMap<CellId, usize> = FxHashMap::default();
        for (&cell, preds) in &self.preds {
            let count = preds.iter().filter(|p| self.preds.contains_key(p)).count();
            in_degree.insert(cell, count);
        }

        let mut queue: Vec<CellId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&cell, _)| cell)
            .collect();
        // Descending so the smallest is popped first
        queue.sort_by_key(|c| std::cmp::Reverse(row_major(c)));

        let mut depth: FxHashMap<CellId, usize> = FxHashMap::default();
        let mut result = Vec::with_capacity(formula_count);

        while let Some(cell) = queue.pop() {
            let cell_depth = 1 + self
                .precedents(cell)
                .filter_map(|p| depth.get(&p).copied())
                .max()
                .unwrap_or(0);
            depth.insert(cell, cell_depth);
            result.push((cell, cell_depth));

            let mut new_zero_degree: Vec<CellId> = Vec::new();
            for dep in self.dependents(cell) {
                if let Some(deg) = in_degree.get_mut(&dep) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        new_zero_degree.push(dep);
                    }
                }
            }
            new_zero_degree.sort_by_key(row_major);
            queue.extend(new_zero_degree.into_iter().rev());
        }

        if result.len() < formula_count {
            let mut cycle_cells: Vec<CellId> = self
                .preds
                .keys()
                .filter(|c| !depth.contains_key(c))
                .copied()
                .collect();
            cycle_cells.sort_by_key(row_major);
            return Err(match cycle_cells.as_slice() {
                [only] => CycleReport::self_reference(*only),
                _ => CycleReport::cycle(cycle_cells),
            });
        }

        Ok(result)
    }

    /// Check all invariants. Panics if any are violated.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (formula_cell, preds) in &self.preds {
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(formula_cell)),
                    "Missing succ edge: {:?} should have {:?} in dependents",
                    pred,
                    formula_cell
                );
            }
        }
        for (cell, dependents) in &self.succs {
            assert!(!dependents.is_empty(), "Empty succs set stored for {:?}", cell);
            for dep in dependents {
                assert!(
                    self.preds.get(dep).is_some_and(|s| s.contains(cell)),
                    "Missing pred edge: {:?} should have {:?} in precedents",
                    dep,
                    cell
                );
            }
        }
    }
}
