//! Column widths, row heights and the scroll origin.
//!
//! Pixel offsets are measured from the top-left of the first visible column
//! and row (the scroll origin), not from column/row 0.

use rustc_hash::FxHashMap;

/// How far past the scroll origin `column_at` searches.
pub const COLUMN_SCAN_LIMIT: usize = 100;

/// How many rows `row_at` walks past the origin, and how many columns or rows
/// the edge hit tests walk from index 0, before giving up.
pub const INDEX_SCAN_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct ColumnRowMetrics {
    pub default_column_width: f64,
    pub default_row_height: f64,
    column_width: FxHashMap<usize, f64>,
    row_height: FxHashMap<usize, f64>,
    scroll_column: usize,
    scroll_row: usize,
}

impl Default for ColumnRowMetrics {
    fn default() -> Self {
        let settings = websheet_config::Settings::default();
        Self::new(settings.default_column_width, settings.default_row_height)
    }
}

/// Overrides count only when positive; anything else falls back to the default.
fn size_or(value: Option<&f64>, default: f64) -> f64 {
    match value {
        Some(&v) if v > 0.0 => v,
        _ => default,
    }
}

impl ColumnRowMetrics {
    pub fn new(default_column_width: f64, default_row_height: f64) -> Self {
        Self {
            default_column_width,
            default_row_height,
            column_width: FxHashMap::default(),
            row_height: FxHashMap::default(),
            scroll_column: 0,
            scroll_row: 0,
        }
    }

    pub fn width(&self, column: usize) -> f64 {
        size_or(self.column_width.get(&column), self.default_column_width)
    }

    pub fn height(&self, row: usize) -> f64 {
        size_or(self.row_height.get(&row), self.default_row_height)
    }

    pub fn set_width(&mut self, column: usize, width: f64) {
        self.column_width.insert(column, width);
    }

    pub fn set_height(&mut self, row: usize, height: f64) {
        self.row_height.insert(row, height);
    }

    /// Explicit width overrides, by column.
    pub fn width_overrides(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.column_width.iter().map(|(i, w)| (*i, *w))
    }

    /// Explicit height overrides, by row.
    pub fn height_overrides(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.row_height.iter().map(|(i, h)| (*i, *h))
    }

    pub fn clear_overrides(&mut self) {
        self.column_width.clear();
        self.row_height.clear();
    }

    // =========================================================================
    // Scroll origin
    // =========================================================================

    pub fn scroll_column(&self) -> usize {
        self.scroll_column
    }

    pub fn scroll_row(&self) -> usize {
        self.scroll_row
    }

    pub fn set_scroll_origin(&mut self, column: usize, row: usize) {
        self.scroll_column = column;
        self.scroll_row = row;
    }

    // =========================================================================
    // Index -> pixel
    // =========================================================================

    /// Left edge of `column`: widths from the scroll origin (inclusive) up to
    /// `column` (exclusive). Columns left of the origin sit at 0.
    pub fn left_of(&self, column: usize) -> f64 {
        (self.scroll_column..column).map(|c| self.width(c)).sum()
    }

    pub fn right_of(&self, column: usize) -> f64 {
        self.left_of(column) + self.width(column)
    }

    pub fn top_of(&self, row: usize) -> f64 {
        (self.scroll_row..row).map(|r| self.height(r)).sum()
    }

    pub fn bottom_of(&self, row: usize) -> f64 {
        self.top_of(row) + self.height(row)
    }

    /// Total width of `count` columns starting at `column`.
    pub fn span_width(&self, column: usize, count: usize) -> f64 {
        (column..column + count).map(|c| self.width(c)).sum()
    }

    /// Total height of `count` rows starting at `row`.
    pub fn span_height(&self, row: usize, count: usize) -> f64 {
        (row..row + count).map(|r| self.height(r)).sum()
    }

    // =========================================================================
    // Pixel -> index
    // =========================================================================

    /// Column under `x`.
    ///
    /// `x` must fall strictly inside a column; a point exactly on a column
    /// edge matches nothing. Scans at most `COLUMN_SCAN_LIMIT` columns past
    /// the origin and returns 0 when nothing matched or `x` is negative.
    pub fn column_at(&self, x: f64) -> usize {
        if x < 0.0 {
            return 0;
        }
        let mut column_x = 0.0;
        for column in self.scroll_column..=self.scroll_column.saturating_add(COLUMN_SCAN_LIMIT) {
            let width = self.width(column);
            if x > column_x && x < column_x + width {
                return column;
            }
            column_x += width;
        }
        0
    }

    /// Row under `y`: the first row, from the origin, whose bottom edge is at
    /// or past `y`. Stops `INDEX_SCAN_LIMIT` rows past the origin.
    pub fn row_at(&self, y: f64) -> usize {
        let mut row = self.scroll_row;
        if !y.is_finite() {
            return row;
        }
        let last = self.scroll_row.saturating_add(INDEX_SCAN_LIMIT);
        let mut row_y = self.height(row);
        while row_y < y && row < last {
            row += 1;
            row_y += self.height(row);
        }
        row
    }

    /// Column whose right edge lies within `tolerance` of `x`, measured from
    /// column 0 as resize handles on the header are.
    pub fn column_edge_at(&self, x: f64, tolerance: f64) -> Option<usize> {
        edge_at(x, tolerance, |column| self.width(column))
    }

    /// Row whose bottom edge lies within `tolerance` of `y`, measured from row 0.
    pub fn row_edge_at(&self, y: f64, tolerance: f64) -> Option<usize> {
        edge_at(y, tolerance, |row| self.height(row))
    }
}

fn edge_at(at: f64, tolerance: f64, size: impl Fn(usize) -> f64) -> Option<usize> {
    if !at.is_finite() || !tolerance.is_finite() {
        return None;
    }
    let mut edge = 0.0;
    for index in 0..INDEX_SCAN_LIMIT {
        edge += size(index);
        if edge >= at + tolerance {
            return None;
        }
        if at < edge + tolerance {
            return Some(index);
        }
    }
    None
}
