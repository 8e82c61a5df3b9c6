use std::time::Instant;

use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;

use websheet_config::Settings;

use super::appearance::{cascade, Appearance};
use super::cell::{Cell, CellValue};
use super::cell_id::CellId;
use super::dep_graph::DepGraph;
use super::error::GridError;
use super::events::{ChangeNotifier, SubscriptionId};
use super::formula::{CellProvider, Evaluator, FormulaEvaluator};
use super::grid::GridStore;
use super::metrics::ColumnRowMetrics;
use super::recalc::{CycleReport, RecalcError, RecalcMode, RecalcReport};
use super::selection::{self, CellSelection, Step};

/// How an evaluation scope reads formula cells it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupMode {
    /// Re-evaluate referenced formulas from their raw text.
    Recursive,
    /// Read the value stored by the last evaluation.
    Cached,
}

/// The sheet as seen by the evaluator during one evaluation.
struct EvalScope<'a> {
    grid: &'a GridStore,
    evaluator: &'a dyn Evaluator,
    mode: LookupMode,
    max_depth: usize,
    /// Formula cells currently being evaluated, outermost first
    visiting: Vec<CellId>,
    now: NaiveDateTime,
}

impl EvalScope<'_> {
    fn evaluate_at(&self, pos: CellId, formula: &str) -> Result<CellValue, GridError> {
        if let Some(start) = self.visiting.iter().position(|c| *c == pos) {
            let report = match &self.visiting[start..] {
                [only] => CycleReport::self_reference(*only),
                cells => CycleReport::cycle(cells.to_vec()),
            };
            return Err(report.into());
        }
        if self.visiting.len() >= self.max_depth {
            let origin = self.visiting.first().copied().unwrap_or(pos);
            return Err(CycleReport::depth_exceeded(origin, self.max_depth).into());
        }

        let mut visiting = self.visiting.clone();
        visiting.push(pos);
        let child = EvalScope { visiting, ..*self };
        self.evaluator.evaluate(&child, formula)
    }
}

impl CellProvider for EvalScope<'_> {
    fn cell_value(&self, pos: CellId) -> Result<CellValue, GridError> {
        let Some(cell) = self.grid.effective(pos) else {
            return Ok(CellValue::Empty);
        };
        let raw = match cell.value.as_deref() {
            Some(raw) => raw,
            None => return Ok(CellValue::Empty),
        };
        if !raw.starts_with('=') {
            return Ok(CellValue::from_literal(raw));
        }

        match self.mode {
            LookupMode::Cached => Ok(cell.evaluated.clone().unwrap_or_default()),
            LookupMode::Recursive => match self.evaluate_at(cell.id(), raw) {
                Err(e @ GridError::RecalculationCycle(_)) => Err(e),
                Err(e) => Ok(CellValue::Error(e.code().to_string())),
                ok => ok,
            },
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// One spreadsheet: cells, sizes, styles, selection and scroll position.
///
/// Every mutating operation notifies change observers once, unless it is
/// called with `silent` or does nothing.
pub struct Sheet {
    pub title: String,
    pub(crate) grid: GridStore,
    pub(crate) metrics: ColumnRowMetrics,
    pub(crate) default_appearance: Appearance,
    pub(crate) selection: CellSelection,
    notifier: ChangeNotifier,
    evaluator: Box<dyn Evaluator>,
    max_eval_depth: usize,
    auto_recalc: bool,
    minimum_resize_size: f64,
}

impl std::fmt::Debug for Sheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("title", &self.title)
            .field("cells", &self.grid.len())
            .field("selection", &self.selection)
            .field("scroll", &(self.metrics.scroll_column(), self.metrics.scroll_row()))
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new("Sheet1")
    }
}

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_settings(title, &Settings::default())
    }

    pub fn with_settings(title: impl Into<String>, settings: &Settings) -> Self {
        Self {
            title: title.into(),
            grid: GridStore::new(),
            metrics: ColumnRowMetrics::new(settings.default_column_width, settings.default_row_height),
            default_appearance: Appearance::from_settings(settings),
            selection: CellSelection::default(),
            notifier: ChangeNotifier::new(),
            evaluator: Box::new(FormulaEvaluator),
            max_eval_depth: settings.max_evaluation_depth.max(1),
            auto_recalc: settings.auto_recalc,
            minimum_resize_size: settings.minimum_resize_size,
        }
    }

    /// Replace the formula evaluator. Stored values are not recomputed.
    pub fn set_evaluator(&mut self, evaluator: impl Evaluator + 'static) {
        self.evaluator = Box::new(evaluator);
    }

    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    pub fn metrics(&self) -> &ColumnRowMetrics {
        &self.metrics
    }

    // =========================================================================
    // Change observers
    // =========================================================================

    pub fn add_on_change(&mut self, handler: impl FnMut() + 'static) -> SubscriptionId {
        self.notifier.add(handler)
    }

    pub fn remove_on_change(&mut self, id: SubscriptionId) -> bool {
        self.notifier.remove(id)
    }

    /// Number of change notifications sent so far.
    pub fn change_count(&self) -> u64 {
        self.notifier.fired()
    }

    // =========================================================================
    // Cells
    // =========================================================================

    pub fn get_cell(&self, column: usize, row: usize) -> Option<&Cell> {
        self.grid.get(CellId::new(column, row))
    }

    /// Get the cell at a position, creating a blank one if absent. Does not notify.
    pub fn force_get_cell(&mut self, column: usize, row: usize) -> &mut Cell {
        self.grid.force_get(CellId::new(column, row))
    }

    pub fn set_cell(&mut self, column: usize, row: usize, cell: Cell, silent: bool) {
        self.grid.insert(CellId::new(column, row), cell);
        if !silent {
            self.notifier.notify();
        }
    }

    /// Drop whatever is stored at a position. Does not notify.
    pub fn remove_cell(&mut self, column: usize, row: usize) -> Option<Cell> {
        self.grid.remove(CellId::new(column, row))
    }

    /// Position whose content applies at `pos`.
    fn master_of(&self, pos: CellId) -> CellId {
        self.grid.get(pos).and_then(|cell| cell.reference).unwrap_or(pos)
    }

    /// Write raw input to a cell.
    ///
    /// Writes to a merge continuation go to its master. `None` or an empty
    /// string removes the value; a merged cell keeps its slot with the value
    /// cleared. A non-silent write evaluates the cell when it holds a formula,
    /// recomputes every other formula and notifies. An evaluation failure
    /// of the written cell is stored as its error code and returned.
    pub fn set_cell_value(
        &mut self,
        column: usize,
        row: usize,
        value: Option<&str>,
        silent: bool,
    ) -> Result<(), GridError> {
        let pos = self.master_of(CellId::new(column, row));
        let mut outcome = Ok(());

        match value.filter(|v| !v.is_empty()) {
            None => self.clear_value(pos),
            Some(raw) => {
                self.grid.force_get(pos).update(raw.to_string(), None);
                if !silent && raw.starts_with('=') {
                    outcome = self.evaluate_into(pos);
                }
            }
        }

        if silent {
            return Ok(());
        }
        if self.auto_recalc {
            self.rescan(Some(pos));
        }
        self.notifier.notify();
        outcome
    }

    fn clear_value(&mut self, pos: CellId) {
        let keep_slot = match self.grid.get(pos) {
            Some(cell) => cell.is_merge_master() || cell.is_continuation(),
            None => return,
        };
        if keep_slot {
            if let Some(cell) = self.grid.get_mut(pos) {
                cell.value = None;
                cell.evaluated = None;
            }
        } else {
            self.grid.remove(pos);
        }
    }

    fn scope(&self, mode: LookupMode) -> EvalScope<'_> {
        EvalScope {
            grid: &self.grid,
            evaluator: self.evaluator.as_ref(),
            mode,
            max_depth: self.max_eval_depth,
            visiting: Vec::new(),
            now: chrono::Local::now().naive_local(),
        }
    }

    /// Evaluate the formula stored at `pos` and store the result.
    fn evaluate_into(&mut self, pos: CellId) -> Result<(), GridError> {
        let Some(formula) = self.grid.get(pos).and_then(|c| c.value.clone()) else {
            return Ok(());
        };
        let result = self.scope(LookupMode::Recursive).evaluate_at(pos, &formula);
        let (value, outcome) = match result {
            Ok(value) => (value, Ok(())),
            Err(e) => (CellValue::Error(e.code().to_string()), Err(e)),
        };
        if let Some(cell) = self.grid.get_mut(pos) {
            cell.evaluated = Some(value);
        }
        outcome
    }

    /// Stored formula cells in position order, skipping merge continuations.
    fn formula_cells(&self) -> Vec<(CellId, String)> {
        self.grid
            .positions_sorted()
            .into_iter()
            .filter_map(|pos| {
                let cell = self.grid.get(pos)?;
                if cell.is_continuation() || !cell.is_formula() {
                    return None;
                }
                Some((pos, cell.value.clone()?))
            })
            .collect()
    }

    /// Store one recompute result, recording failures on the report.
    fn store_result(&mut self, report: &mut RecalcReport, pos: CellId, result: Result<CellValue, GridError>) {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                if matches!(e, GridError::RecalculationCycle(_)) {
                    report.had_cycles = true;
                }
                log::warn!("recalc {}: {}", pos, e);
                report.push_error(RecalcError::new(pos, e.to_string()));
                CellValue::Error(e.code().to_string())
            }
        };
        if let Some(cell) = self.grid.get_mut(pos) {
            cell.evaluated = Some(value);
        }
        report.cells_recomputed += 1;
    }

    /// Re-evaluate every formula from raw values, except `skip`.
    fn rescan(&mut self, skip: Option<CellId>) -> RecalcReport {
        let start = Instant::now();
        let mut report = RecalcReport::new(RecalcMode::Full);

        let formulas: Vec<(CellId, String)> = self
            .formula_cells()
            .into_iter()
            .filter(|(pos, _)| Some(*pos) != skip)
            .collect();
        let results: Vec<(CellId, Result<CellValue, GridError>)> = {
            let scope = self.scope(LookupMode::Recursive);
            formulas
                .into_iter()
                .map(|(pos, formula)| (pos, scope.evaluate_at(pos, &formula)))
                .collect()
        };
        for (pos, result) in results {
            self.store_result(&mut report, pos, result);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log::debug!("{}", report.log_line());
        report
    }

    /// Recompute every formula by full rescan and notify.
    pub fn recalculate_all(&mut self) -> RecalcReport {
        let report = self.rescan(None);
        self.notifier.notify();
        report
    }

    /// Recompute every formula once, in dependency order, reading the stored
    /// values of the formulas it references.
    ///
    /// A reference cycle is reported as `GridError::RecalculationCycle` and
    /// nothing is evaluated.
    pub fn recalculate_ordered(&mut self) -> Result<RecalcReport, GridError> {
        let start = Instant::now();
        let mut report = RecalcReport::new(RecalcMode::Ordered);

        let mut graph = DepGraph::new();
        for (pos, formula) in self.formula_cells() {
            let preds: FxHashSet<CellId> = match self.evaluator.references(&formula) {
                Ok(refs) => refs.into_iter().map(|r| self.master_of(r)).collect(),
                // Evaluation will store the parse error
                Err(_) => FxHashSet::default(),
            };
            graph.set_formula(pos, preds);
        }

        let order = graph.topo_order_all_formulas().map_err(|cycle| {
            log::warn!("ordered recalc aborted: {}", cycle);
            GridError::from(cycle)
        })?;

        for (pos, depth) in order {
            let Some(formula) = self.grid.get(pos).and_then(|c| c.value.clone()) else {
                continue;
            };
            let result = {
                let scope = self.scope(LookupMode::Cached);
                self.evaluator.evaluate(&scope, &formula)
            };
            self.store_result(&mut report, pos, result);
            report.max_depth = report.max_depth.max(depth);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log::debug!("{}", report.log_line());
        self.notifier.notify();
        Ok(report)
    }

    /// Evaluated value of a formula cell, if it has been evaluated.
    pub fn evaluated_value(&self, column: usize, row: usize) -> Option<&CellValue> {
        self.grid.effective(CellId::new(column, row))?.evaluated.as_ref()
    }

    /// Text a renderer shows at a position, read through merges.
    pub fn display_value(&self, column: usize, row: usize) -> String {
        self.grid
            .effective(CellId::new(column, row))
            .map(Cell::display_value)
            .unwrap_or_default()
    }

    /// Evaluate a cell name (`B12`) or range (`A1:B3`) against current raw values.
    pub fn evaluated_value_by_name(&self, name: &str) -> Result<CellValue, GridError> {
        self.scope(LookupMode::Recursive).value_by_name(name)
    }

    // =========================================================================
    // Column widths and row heights
    // =========================================================================

    pub fn column_width(&self, column: usize) -> f64 {
        self.metrics.width(column)
    }

    pub fn row_height(&self, row: usize) -> f64 {
        self.metrics.height(row)
    }

    pub fn set_column_width(&mut self, column: usize, width: f64) {
        self.metrics.set_width(column, width);
        self.notifier.notify();
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.metrics.set_height(row, height);
        self.notifier.notify();
    }

    /// Grow or shrink a column by `delta`, never below the minimum resize size.
    pub fn alter_column_width(&mut self, column: usize, delta: f64) -> f64 {
        let width = (self.metrics.width(column) + delta).max(self.minimum_resize_size);
        self.set_column_width(column, width);
        width
    }

    /// Grow or shrink a row by `delta`, never below the minimum resize size.
    pub fn alter_row_height(&mut self, row: usize, delta: f64) -> f64 {
        let height = (self.metrics.height(row) + delta).max(self.minimum_resize_size);
        self.set_row_height(row, height);
        height
    }

    pub fn column_at(&self, x: f64) -> usize {
        self.metrics.column_at(x)
    }

    pub fn row_at(&self, y: f64) -> usize {
        self.metrics.row_at(y)
    }

    pub fn column_edge_at(&self, x: f64, tolerance: f64) -> Option<usize> {
        self.metrics.column_edge_at(x, tolerance)
    }

    pub fn row_edge_at(&self, y: f64, tolerance: f64) -> Option<usize> {
        self.metrics.row_edge_at(y, tolerance)
    }

    /// Width covered by the cell at a position, including merged columns.
    pub fn cell_width(&self, column: usize, row: usize) -> f64 {
        match self.grid.effective(CellId::new(column, row)) {
            Some(cell) => self.metrics.span_width(cell.column_id, cell.col_span),
            None => self.metrics.width(column),
        }
    }

    /// Height covered by the cell at a position, including merged rows.
    pub fn cell_height(&self, column: usize, row: usize) -> f64 {
        match self.grid.effective(CellId::new(column, row)) {
            Some(cell) => self.metrics.span_height(cell.row_id, cell.row_span),
            None => self.metrics.height(row),
        }
    }

    /// Stored cell under a pixel position, read through merges.
    pub fn find_cell_by_xy(&self, x: f64, y: f64) -> Option<&Cell> {
        let pos = CellId::new(self.metrics.column_at(x), self.metrics.row_at(y));
        self.grid.effective(pos)
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    pub fn scroll_column(&self) -> usize {
        self.metrics.scroll_column()
    }

    pub fn scroll_row(&self) -> usize {
        self.metrics.scroll_row()
    }

    /// Move the scroll origin, snapping forward out of merged regions.
    pub fn scroll(&mut self, column: usize, row: usize) {
        let (snapped_column, snapped_row) = self.grid.snap_out_of_merges(column, row);
        if (snapped_column, snapped_row) != (column, row) {
            log::debug!(
                "scroll {} snapped to {}",
                CellId::new(column, row),
                CellId::new(snapped_column, snapped_row)
            );
        }
        self.metrics.set_scroll_origin(snapped_column, snapped_row);
        self.notifier.notify();
    }

    pub fn scroll_up(&mut self) {
        if let Some(row) = self.scroll_row().checked_sub(1) {
            self.scroll(self.scroll_column(), row);
        }
    }

    pub fn scroll_down(&mut self) {
        self.scroll(self.scroll_column(), self.scroll_row() + 1);
    }

    pub fn scroll_left(&mut self) {
        if let Some(column) = self.scroll_column().checked_sub(1) {
            self.scroll(column, self.scroll_row());
        }
    }

    pub fn scroll_right(&mut self) {
        self.scroll(self.scroll_column() + 1, self.scroll_row());
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Merge a `width` x `height` region. A 1x1 region is a no-op.
    pub fn merge(&mut self, column: usize, row: usize, width: usize, height: usize) {
        if width <= 1 && height <= 1 {
            return;
        }
        self.grid.merge(CellId::new(column, row), width, height);
        self.notifier.notify();
    }

    /// Dissolve the merge mastered at a position. Returns false when there is
    /// nothing to unmerge.
    pub fn unmerge(&mut self, column: usize, row: usize) -> bool {
        let changed = self.grid.unmerge(CellId::new(column, row));
        if changed {
            self.notifier.notify();
        }
        changed
    }

    // =========================================================================
    // Appearance
    // =========================================================================

    /// Effective appearance of a cell after the cell > column > row > sheet cascade.
    pub fn appearance(&self, column: usize, row: usize) -> Appearance {
        cascade(
            self.grid.cell_appearance(CellId::new(column, row)),
            self.grid.column_appearance(column),
            self.grid.row_appearance(row),
            &self.default_appearance,
        )
    }

    pub fn default_appearance(&self) -> &Appearance {
        &self.default_appearance
    }

    pub fn cell_appearance(&self, column: usize, row: usize) -> Option<&Appearance> {
        self.grid.cell_appearance(CellId::new(column, row))
    }

    pub fn set_cell_appearance(&mut self, column: usize, row: usize, appearance: Appearance) {
        self.grid.set_cell_appearance(CellId::new(column, row), appearance);
        self.notifier.notify();
    }

    pub fn column_appearance(&self, column: usize) -> Option<&Appearance> {
        self.grid.column_appearance(column)
    }

    pub fn set_column_appearance(&mut self, column: usize, appearance: Appearance) {
        self.grid.set_column_appearance(column, appearance);
        self.notifier.notify();
    }

    pub fn row_appearance(&self, row: usize) -> Option<&Appearance> {
        self.grid.row_appearance(row)
    }

    pub fn set_row_appearance(&mut self, row: usize, appearance: Appearance) {
        self.grid.set_row_appearance(row, appearance);
        self.notifier.notify();
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn selection(&self) -> CellSelection {
        self.selection
    }

    pub fn set_selection(&mut self, selection: CellSelection) {
        self.selection = selection;
        self.notifier.notify();
    }

    /// Move the cursor one step. The selection is unchanged on error.
    pub fn step(&mut self, step: Step) -> Result<(), GridError> {
        selection::navigate(&mut self.selection, &self.grid, step)?;
        self.notifier.notify();
        Ok(())
    }

    pub fn next_column(&mut self) -> Result<(), GridError> {
        self.step(Step::NextColumn)
    }

    pub fn prev_column(&mut self) -> Result<(), GridError> {
        self.step(Step::PrevColumn)
    }

    pub fn next_row(&mut self) -> Result<(), GridError> {
        self.step(Step::NextRow)
    }

    pub fn prev_row(&mut self) -> Result<(), GridError> {
        self.step(Step::PrevRow)
    }

    /// Select the cells between two pixel positions.
    pub fn select_by_xy(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.selection = selection::select_by_xy(&self.grid, &self.metrics, x1, y1, x2, y2);
        self.notifier.notify();
    }

    /// Name of the cursor cell, e.g. `B3`.
    pub fn selection_label(&self) -> String {
        self.selection.cursor().name()
    }

    /// Cell under the cursor, read through merges.
    pub fn selected_cell(&self) -> Option<&Cell> {
        self.grid.effective(self.selection.cursor())
    }

    /// Raw input of the cursor cell, as shown in an edit box.
    pub fn selected_value(&self) -> String {
        self.selected_cell()
            .and_then(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    pub fn selected_appearance(&self) -> Appearance {
        let cursor = self.selection.cursor();
        self.appearance(cursor.column, cursor.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counted(sheet: &mut Sheet) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        sheet.add_on_change(move || *c.borrow_mut() += 1);
        count
    }

    #[test]
    fn test_formula_follows_its_input() {
        let mut sheet = Sheet::new("Budget");
        sheet.set_cell_value(0, 0, Some("5"), false).unwrap();
        sheet.set_cell_value(1, 0, Some("=A1+1"), false).unwrap();
        assert_eq!(sheet.evaluated_value(1, 0), Some(&CellValue::Number(6.0)));

        sheet.set_cell_value(0, 0, Some("10"), false).unwrap();
        assert_eq!(sheet.evaluated_value(1, 0), Some(&CellValue::Number(11.0)));
        assert_eq!(sheet.display_value(1, 0), "11");
        assert_eq!(sheet.get_cell(1, 0).unwrap().value.as_deref(), Some("=A1+1"));
    }

    #[test]
    fn test_literal_write_has_no_evaluated_value() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(2, 3, Some("hello"), false).unwrap();
        let cell = sheet.get_cell(2, 3).unwrap();
        assert_eq!(cell.value.as_deref(), Some("hello"));
        assert_eq!(cell.evaluated, None);
    }

    #[test]
    fn test_silent_write_skips_evaluation_and_observers() {
        let mut sheet = Sheet::default();
        let count = counted(&mut sheet);
        sheet.set_cell_value(0, 0, Some("=1+1"), true).unwrap();
        assert_eq!(sheet.evaluated_value(0, 0), None);
        assert_eq!(*count.borrow(), 0);

        sheet.recalculate_all();
        assert_eq!(sheet.evaluated_value(0, 0), Some(&CellValue::Number(2.0)));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_cycle_is_reported_and_stored() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(0, 0, Some("=B1"), false).unwrap();
        let err = sheet.set_cell_value(1, 0, Some("=A1"), false).unwrap_err();
        assert!(matches!(err, GridError::RecalculationCycle(_)));
        assert_eq!(sheet.display_value(1, 0), "#CYCLE!");
        assert_eq!(sheet.display_value(0, 0), "#CYCLE!");

        let err = sheet.set_cell_value(2, 0, Some("=C1*2"), false).unwrap_err();
        assert_eq!(err.to_string(), "Cell C1 references itself");
    }

    #[test]
    fn test_depth_limit() {
        let settings = Settings {
            max_evaluation_depth: 3,
            ..Settings::default()
        };
        let mut sheet = Sheet::with_settings("Deep", &settings);
        sheet.set_cell_value(0, 0, Some("1"), true).unwrap();
        for row in 1..5 {
            let formula = format!("=A{}+1", row);
            sheet.set_cell_value(0, row, Some(formula.as_str()), true).unwrap();
        }
        let report = sheet.recalculate_all();
        assert!(report.had_cycles);
        assert_eq!(sheet.display_value(0, 2), "3");
        assert_eq!(sheet.display_value(0, 4), "#CYCLE!");
    }

    #[test]
    fn test_invalid_reference_error() {
        let mut sheet = Sheet::default();
        let err = sheet.set_cell_value(0, 0, Some("=A0+1"), false).unwrap_err();
        assert!(matches!(err, GridError::InvalidReference(_)));
        assert_eq!(sheet.display_value(0, 0), "#REF!");
    }

    #[test]
    fn test_removal() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(0, 0, Some("x"), false).unwrap();
        sheet.set_cell_value(0, 0, None, false).unwrap();
        assert!(sheet.get_cell(0, 0).is_none());

        sheet.set_cell_value(1, 1, Some("kept"), false).unwrap();
        sheet.merge(1, 1, 2, 1);
        sheet.set_cell_value(2, 1, Some(""), false).unwrap();
        let master = sheet.get_cell(1, 1).unwrap();
        assert_eq!(master.value, None);
        assert_eq!(master.col_span, 2);
        assert_eq!(sheet.get_cell(2, 1).unwrap().reference, Some(CellId::new(1, 1)));
    }

    #[test]
    fn test_write_to_continuation_goes_to_master() {
        let mut sheet = Sheet::default();
        sheet.merge(0, 0, 2, 2);
        sheet.set_cell_value(1, 1, Some("7"), false).unwrap();
        assert_eq!(sheet.get_cell(0, 0).unwrap().value.as_deref(), Some("7"));
        assert_eq!(sheet.display_value(1, 1), "7");
        sheet.set_cell_value(3, 0, Some("=B2*2"), false).unwrap();
        assert_eq!(sheet.display_value(3, 0), "14");
    }

    #[test]
    fn test_ordered_recalculation() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(0, 0, Some("2"), true).unwrap();
        sheet.set_cell_value(0, 2, Some("=A2*10"), true).unwrap();
        sheet.set_cell_value(0, 1, Some("=A1+1"), true).unwrap();
        sheet.set_cell_value(1, 0, Some("=SUM(A1:A3)"), true).unwrap();

        let report = sheet.recalculate_ordered().unwrap();
        assert_eq!(report.cells_recomputed, 3);
        assert_eq!(report.max_depth, 3);
        assert_eq!(sheet.display_value(0, 1), "3");
        assert_eq!(sheet.display_value(0, 2), "30");
        assert_eq!(sheet.display_value(1, 0), "35");
    }

    #[test]
    fn test_ordered_recalculation_rejects_cycles() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(0, 0, Some("=B1"), true).unwrap();
        sheet.set_cell_value(1, 0, Some("=A1"), true).unwrap();
        let count = counted(&mut sheet);

        let err = sheet.recalculate_ordered().unwrap_err();
        assert!(matches!(err, GridError::RecalculationCycle(_)));
        assert_eq!(sheet.evaluated_value(0, 0), None);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_evaluated_value_by_name() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(0, 0, Some("1"), false).unwrap();
        sheet.set_cell_value(0, 1, Some("=A1*3"), false).unwrap();
        assert_eq!(sheet.evaluated_value_by_name("A2").unwrap(), CellValue::Number(3.0));
        assert_eq!(
            sheet.evaluated_value_by_name("A1:A2").unwrap(),
            CellValue::List(vec![CellValue::Number(1.0), CellValue::Number(3.0)])
        );
        assert!(sheet.evaluated_value_by_name("A0").is_err());
    }

    #[test]
    fn test_alter_sizes_clamp() {
        let mut sheet = Sheet::default();
        assert_eq!(sheet.alter_column_width(2, 25.0), 125.0);
        assert_eq!(sheet.alter_column_width(2, -500.0), 5.0);
        assert_eq!(sheet.column_width(2), 5.0);
        assert_eq!(sheet.alter_row_height(0, -10.0), 20.0);
    }

    #[test]
    fn test_cell_geometry_follows_merges() {
        let mut sheet = Sheet::default();
        sheet.merge(1, 1, 3, 2);
        assert_eq!(sheet.cell_width(1, 1), 300.0);
        assert_eq!(sheet.cell_height(2, 2), 60.0);
        assert_eq!(sheet.cell_width(9, 9), 100.0);

        let found = sheet.find_cell_by_xy(250.0, 40.0).unwrap();
        assert_eq!(found.id(), CellId::new(1, 1));
        assert!(sheet.find_cell_by_xy(950.0, 400.0).is_none());
    }

    #[test]
    fn test_scroll_helpers() {
        let mut sheet = Sheet::default();
        sheet.scroll_up();
        sheet.scroll_left();
        assert_eq!((sheet.scroll_column(), sheet.scroll_row()), (0, 0));
        sheet.scroll_right();
        sheet.scroll_down();
        sheet.scroll_down();
        assert_eq!((sheet.scroll_column(), sheet.scroll_row()), (1, 2));
        sheet.scroll_up();
        assert_eq!(sheet.scroll_row(), 1);
    }

    #[test]
    fn test_scroll_snaps_out_of_merges() {
        let mut sheet = Sheet::default();
        sheet.merge(2, 3, 3, 4);
        sheet.scroll(3, 5);
        assert_eq!((sheet.scroll_column(), sheet.scroll_row()), (5, 7));
        sheet.scroll(2, 3);
        assert_eq!((sheet.scroll_column(), sheet.scroll_row()), (2, 3));
    }

    #[test]
    fn test_merge_notifications() {
        let mut sheet = Sheet::default();
        let count = counted(&mut sheet);
        sheet.merge(0, 0, 1, 1);
        assert!(!sheet.unmerge(0, 0));
        assert_eq!(*count.borrow(), 0);
        assert!(sheet.get_cell(0, 0).is_none());

        sheet.merge(0, 0, 2, 2);
        assert!(sheet.unmerge(0, 0));
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_selection_accessors() {
        let mut sheet = Sheet::default();
        sheet.set_cell_value(1, 2, Some("=1+1"), false).unwrap();
        sheet.set_row_appearance(2, Appearance::with_font("mono"));
        sheet.set_selection(CellSelection::at(CellId::new(1, 2)));

        assert_eq!(sheet.selection_label(), "B3");
        assert_eq!(sheet.selected_value(), "=1+1");
        assert_eq!(sheet.selected_cell().unwrap().display_value(), "2");
        assert_eq!(sheet.selected_appearance().font_name.as_deref(), Some("mono"));
    }

    #[test]
    fn test_steps_notify_once() {
        let mut sheet = Sheet::default();
        sheet.set_selection(CellSelection::at(CellId::new(1, 1)));
        let count = counted(&mut sheet);
        sheet.next_column().unwrap();
        sheet.next_row().unwrap();
        sheet.prev_column().unwrap();
        sheet.prev_row().unwrap();
        assert_eq!(*count.borrow(), 4);
        assert_eq!(sheet.selection().cursor(), CellId::new(1, 1));
    }

    #[test]
    fn test_auto_recalc_off() {
        let settings = Settings {
            auto_recalc: false,
            ..Settings::default()
        };
        let mut sheet = Sheet::with_settings("Manual", &settings);
        sheet.set_cell_value(0, 0, Some("1"), false).unwrap();
        sheet.set_cell_value(1, 0, Some("=A1"), false).unwrap();
        sheet.set_cell_value(0, 0, Some("2"), false).unwrap();
        assert_eq!(sheet.display_value(1, 0), "1");
        sheet.recalculate_all();
        assert_eq!(sheet.display_value(1, 0), "2");
    }
}
