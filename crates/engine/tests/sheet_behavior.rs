// End-to-end behavior of the sheet facade.

use std::cell::RefCell;
use std::rc::Rc;

use websheet_engine::appearance::{Appearance, Border, TextStyle};
use websheet_engine::cell::CellValue;
use websheet_engine::cell_id::CellId;
use websheet_engine::error::GridError;
use websheet_engine::formula::{CellProvider, Evaluator};
use websheet_engine::selection::CellSelection;
use websheet_engine::sheet::Sheet;
use websheet_engine::snapshot::SheetSnapshot;

fn range(left: usize, top: usize, right: usize, bottom: usize) -> CellSelection {
    CellSelection {
        left,
        top,
        right,
        bottom,
        row_id: top,
        column_id: left,
    }
}

#[test]
fn dependent_formula_tracks_input() {
    let mut sheet = Sheet::new("Sheet1");
    sheet.set_cell_value(0, 0, Some("5"), false).unwrap();
    sheet.set_cell_value(1, 0, Some("=A1+1"), false).unwrap();
    sheet.set_cell_value(0, 0, Some("10"), false).unwrap();

    assert_eq!(sheet.evaluated_value(1, 0), Some(&CellValue::Number(11.0)));
}

#[test]
fn chained_formulas_and_functions() {
    let mut sheet = Sheet::default();
    for (row, value) in ["3", "4", "5"].iter().enumerate() {
        sheet.set_cell_value(0, row, Some(*value), false).unwrap();
    }
    sheet.set_cell_value(1, 0, Some("=SUM(A1:A3)"), false).unwrap();
    sheet.set_cell_value(1, 1, Some("=B1/COUNT(A1:A3)"), false).unwrap();
    sheet.set_cell_value(1, 2, Some("=IF(B2>3, \"high\", \"low\")"), false).unwrap();

    assert_eq!(sheet.display_value(1, 0), "12");
    assert_eq!(sheet.display_value(1, 1), "4");
    assert_eq!(sheet.display_value(1, 2), "high");

    sheet.set_cell_value(0, 2, Some("-7"), false).unwrap();
    assert_eq!(sheet.display_value(1, 2), "low");
}

#[test]
fn cycle_is_an_error_not_a_hang() {
    let mut sheet = Sheet::default();
    sheet.set_cell_value(0, 0, Some("=C1"), false).unwrap();
    sheet.set_cell_value(1, 0, Some("=A1"), false).unwrap();
    let err = sheet.set_cell_value(2, 0, Some("=B1"), false).unwrap_err();

    match err {
        GridError::RecalculationCycle(report) => assert_eq!(report.cells.len(), 3),
        other => panic!("expected a cycle, got {other:?}"),
    }
    for column in 0..3 {
        assert_eq!(sheet.display_value(column, 0), "#CYCLE!");
    }

    // Breaking the cycle recovers every cell
    sheet.set_cell_value(2, 0, Some("1"), false).unwrap();
    assert_eq!(sheet.display_value(0, 0), "1");
    assert_eq!(sheet.display_value(1, 0), "1");
}

#[test]
fn row_appearance_reaches_every_column() {
    let mut sheet = Sheet::default();
    sheet.set_row_appearance(5, Appearance::with_font("X"));

    for column in [0, 3, 40] {
        assert_eq!(sheet.appearance(column, 5).font_name.as_deref(), Some("X"));
    }
    assert_eq!(sheet.appearance(0, 4).font_name.as_deref(), Some("lato"));
}

#[test]
fn cascade_is_per_field() {
    let mut sheet = Sheet::default();
    sheet.set_column_appearance(
        2,
        Appearance {
            background: Some("#eeeeee".into()),
            text_style: Some(TextStyle::Bold),
            ..Appearance::default()
        },
    );
    sheet.set_cell_appearance(
        2,
        7,
        Appearance {
            background: Some(String::new()),
            font_size: Some(0.0),
            horizontal_border: Some(Border {
                width: 1.0,
                color: "#000".into(),
            }),
            ..Appearance::default()
        },
    );

    let resolved = sheet.appearance(2, 7);
    // Empty string and zero fall through to the next layer
    assert_eq!(resolved.background.as_deref(), Some("#eeeeee"));
    assert_eq!(resolved.font_size, Some(12.0));
    assert_eq!(resolved.text_style, Some(TextStyle::Bold));
    assert!(resolved.horizontal_border.is_some());
}

#[test]
fn navigation_skips_merged_cells() {
    let mut sheet = Sheet::default();
    sheet.merge(1, 0, 2, 1);
    sheet.set_selection(range(0, 0, 3, 1));

    sheet.next_column().unwrap();
    assert_eq!(sheet.selection().cursor(), CellId::new(1, 0));
    // C1 is covered by the merge at B1
    sheet.next_column().unwrap();
    assert_eq!(sheet.selection().cursor(), CellId::new(3, 0));
    // Wraps to the next row
    sheet.next_column().unwrap();
    assert_eq!(sheet.selection().cursor(), CellId::new(0, 1));
}

#[test]
fn navigation_inside_a_single_merge_is_bounded() {
    let mut sheet = Sheet::default();
    sheet.merge(0, 0, 2, 2);
    let selection = CellSelection {
        row_id: 0,
        column_id: 0,
        ..range(0, 0, 1, 1)
    };
    sheet.set_selection(selection);

    let err = sheet.next_column().unwrap_err();
    assert!(matches!(err, GridError::NavigationBound { .. }));
    assert_eq!(sheet.selection(), selection);
}

#[test]
fn select_by_xy_widens_over_merges() {
    let mut sheet = Sheet::default();
    sheet.merge(1, 1, 2, 3);

    // From inside C3 (a continuation) back to A1
    sheet.select_by_xy(250.0, 75.0, 50.0, 10.0);
    let selection = sheet.selection();
    assert_eq!(selection.cursor(), CellId::new(1, 1));
    assert_eq!((selection.left, selection.top), (0, 0));
    assert_eq!((selection.right, selection.bottom), (2, 3));
    assert_eq!(sheet.selection_label(), "B2");
}

#[test]
fn observers_fire_once_per_operation_and_survive_failures() {
    let mut sheet = Sheet::default();
    let seen = Rc::new(RefCell::new(Vec::new()));

    sheet.add_on_change(|| panic!("broken renderer"));
    let log = Rc::clone(&seen);
    let id = sheet.add_on_change(move || log.borrow_mut().push("renderer"));

    sheet.set_cell_value(0, 0, Some("1"), false).unwrap();
    sheet.merge(0, 1, 2, 2);
    sheet.scroll(0, 1);
    sheet.set_cell_value(0, 0, Some("2"), true).unwrap();
    assert_eq!(seen.borrow().len(), 3);

    assert!(sheet.remove_on_change(id));
    sheet.set_cell_value(0, 0, Some("3"), false).unwrap();
    assert_eq!(seen.borrow().len(), 3);
    assert_eq!(sheet.change_count(), 4);
}

#[test]
fn snapshot_round_trip_through_json() {
    let mut sheet = Sheet::new("Inventory");
    sheet.set_cell_value(0, 0, Some("apples"), false).unwrap();
    sheet.set_cell_value(1, 0, Some("12"), false).unwrap();
    sheet.set_cell_value(2, 0, Some("=B1*2"), false).unwrap();
    sheet.merge(0, 3, 3, 1);
    sheet.set_column_width(1, 60.0);
    sheet.set_column_appearance(2, Appearance::with_background("#ffeecc"));

    let json = sheet.save().unwrap().to_json().unwrap();
    let snapshot = SheetSnapshot::from_json(&json).unwrap();
    let mut restored = Sheet::default();
    restored.load(snapshot).unwrap();

    assert_eq!(restored.title, "Inventory");
    assert_eq!(restored.display_value(2, 0), "24");
    assert_eq!(restored.cell_width(1, 3), 260.0);
    assert_eq!(restored.appearance(2, 9).background.as_deref(), Some("#ffeecc"));
    assert_eq!(restored.save().unwrap(), sheet.save().unwrap());
}

struct UppercaseEvaluator;

impl Evaluator for UppercaseEvaluator {
    fn evaluate(&self, provider: &dyn CellProvider, formula: &str) -> Result<CellValue, GridError> {
        let name = formula.trim_start_matches('=').trim();
        let value = provider.value_by_name(name)?;
        Ok(CellValue::Text(value.to_text().to_uppercase()))
    }

    fn references(&self, formula: &str) -> Result<Vec<CellId>, GridError> {
        Ok(vec![CellId::parse(formula.trim_start_matches('=').trim())?])
    }
}

#[test]
fn custom_evaluator_sees_the_sheet() {
    let mut sheet = Sheet::default();
    sheet.set_evaluator(UppercaseEvaluator);
    sheet.set_cell_value(0, 0, Some("quiet"), false).unwrap();
    sheet.set_cell_value(0, 1, Some("=A1"), false).unwrap();
    assert_eq!(sheet.display_value(0, 1), "QUIET");

    let err = sheet.set_cell_value(0, 2, Some("=nope"), false).unwrap_err();
    assert!(matches!(err, GridError::InvalidReference(_)));
}
