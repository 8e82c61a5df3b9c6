//! Whole-sheet snapshot for saving and restoring.
//!
//! The JSON shape is camelCase. Column/row appearance and size overrides
//! are index-addressed arrays where `null` marks an index without an
//! override.

use serde::{Deserialize, Serialize};

use websheet_config::Settings;

use crate::appearance::Appearance;
use crate::cell::Cell;
use crate::cell_id::CellId;
use crate::error::GridError;
use crate::selection::CellSelection;
use crate::sheet::Sheet;

/// Appearance override of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceEntry {
    pub column_id: usize,
    pub row_id: usize,
    pub appearance: Appearance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSnapshot {
    pub title: String,
    /// Stored cells in position order
    pub data: Vec<Cell>,
    /// Per-cell appearance overrides in position order
    #[serde(default)]
    pub appearance: Vec<AppearanceEntry>,
    #[serde(default)]
    pub column_appearance: Vec<Option<Appearance>>,
    #[serde(default)]
    pub row_appearance: Vec<Option<Appearance>>,
    #[serde(default)]
    pub row_height: Vec<Option<f64>>,
    #[serde(default)]
    pub column_width: Vec<Option<f64>>,
    /// Scroll origin column
    #[serde(default)]
    pub scroll_x: usize,
    /// Scroll origin row
    #[serde(default)]
    pub scroll_y: usize,
    #[serde(default)]
    pub selection: CellSelection,
}

impl SheetSnapshot {
    pub fn to_json(&self) -> Result<String, GridError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, GridError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that every cell's span fits the index space and that every merge
    /// continuation points at a stored master whose span covers it.
    pub fn validate(&self) -> Result<(), GridError> {
        let mut extents: rustc_hash::FxHashMap<CellId, (&Cell, usize, usize)> =
            rustc_hash::FxHashMap::default();
        for cell in &self.data {
            let right = cell.column_id.checked_add(cell.col_span);
            let bottom = cell.row_id.checked_add(cell.row_span);
            let (Some(right), Some(bottom)) = (right, bottom) else {
                return Err(GridError::Snapshot(format!("{} spans past the end of the grid", cell.id())));
            };
            extents.insert(cell.id(), (cell, right, bottom));
        }

        for cell in &self.data {
            let Some(master_id) = cell.reference else {
                continue;
            };
            let (master, right, bottom) = extents.get(&master_id).ok_or_else(|| {
                GridError::Snapshot(format!("{} references missing cell {}", cell.id(), master_id))
            })?;
            let covered = !master.is_continuation()
                && (master.column_id..*right).contains(&cell.column_id)
                && (master.row_id..*bottom).contains(&cell.row_id);
            if !covered {
                return Err(GridError::Snapshot(format!(
                    "{} is not inside the merge at {}",
                    cell.id(),
                    master_id
                )));
            }
        }
        Ok(())
    }
}

/// Highest column or row index an index-addressed array may hold.
pub const MAX_INDEXED_OVERRIDE: usize = 1_048_575;

/// Index-addressed array with `None` holes.
fn dense<T>(label: &str, entries: impl Iterator<Item = (usize, T)>) -> Result<Vec<Option<T>>, GridError> {
    let mut out: Vec<Option<T>> = Vec::new();
    for (index, value) in entries {
        if index > MAX_INDEXED_OVERRIDE {
            return Err(GridError::Snapshot(format!(
                "{label} override at index {index} is beyond {MAX_INDEXED_OVERRIDE}"
            )));
        }
        if index >= out.len() {
            out.resize_with(index + 1, || None);
        }
        out[index] = Some(value);
    }
    Ok(out)
}

fn present<T>(items: Vec<Option<T>>) -> impl Iterator<Item = (usize, T)> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| item.map(|value| (index, value)))
}

impl Sheet {
    /// Capture the whole sheet.
    ///
    /// Fails when a column or row override sits past
    /// `MAX_INDEXED_OVERRIDE`, since the array form cannot hold it.
    pub fn save(&self) -> Result<SheetSnapshot, GridError> {
        let data = self
            .grid
            .positions_sorted()
            .into_iter()
            .filter_map(|pos| self.grid.get(pos).cloned())
            .collect();

        let mut appearance: Vec<AppearanceEntry> = self
            .grid
            .cell_appearances()
            .map(|(pos, appearance)| AppearanceEntry {
                column_id: pos.column,
                row_id: pos.row,
                appearance: appearance.clone(),
            })
            .collect();
        appearance.sort_by_key(|entry| (entry.column_id, entry.row_id));

        Ok(SheetSnapshot {
            title: self.title.clone(),
            data,
            appearance,
            column_appearance: dense(
                "column appearance",
                self.grid.column_appearances().map(|(i, a)| (i, a.clone())),
            )?,
            row_appearance: dense(
                "row appearance",
                self.grid.row_appearances().map(|(i, a)| (i, a.clone())),
            )?,
            row_height: dense("row height", self.metrics.height_overrides())?,
            column_width: dense("column width", self.metrics.width_overrides())?,
            scroll_x: self.metrics.scroll_column(),
            scroll_y: self.metrics.scroll_row(),
            selection: self.selection,
        })
    }

    /// Replace the sheet's content with `snapshot`.
    ///
    /// Restores stored values, scroll origin and selection verbatim, without
    /// re-evaluating or notifying. An inconsistent snapshot is rejected
    /// before anything is changed.
    pub fn load(&mut self, snapshot: SheetSnapshot) -> Result<(), GridError> {
        snapshot.validate()?;

        self.grid.clear();
        self.metrics.clear_overrides();

        for cell in snapshot.data {
            self.grid.insert(cell.id(), cell);
        }
        for entry in snapshot.appearance {
            self.grid
                .set_cell_appearance(CellId::new(entry.column_id, entry.row_id), entry.appearance);
        }
        for (column, appearance) in present(snapshot.column_appearance) {
            self.grid.set_column_appearance(column, appearance);
        }
        for (row, appearance) in present(snapshot.row_appearance) {
            self.grid.set_row_appearance(row, appearance);
        }
        for (column, width) in present(snapshot.column_width) {
            self.metrics.set_width(column, width);
        }
        for (row, height) in present(snapshot.row_height) {
            self.metrics.set_height(row, height);
        }

        self.metrics.set_scroll_origin(snapshot.scroll_x, snapshot.scroll_y);
        self.selection = snapshot.selection;
        self.title = snapshot.title;
        log::debug!("loaded sheet {:?}: {} cells", self.title, self.grid.len());
        Ok(())
    }

    /// Build a sheet from a snapshot with the given settings.
    pub fn load_with_settings(snapshot: SheetSnapshot, settings: &Settings) -> Result<Self, GridError> {
        let mut sheet = Sheet::with_settings(snapshot.title.clone(), settings);
        sheet.load(snapshot)?;
        Ok(sheet)
    }
}
