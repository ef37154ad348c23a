// src/test_support.rs
//! Fixtures shared by the `*_tests.rs` modules.

use std::fs;
use std::path::PathBuf;

use rust_xlsxwriter::Workbook;

use crate::spreadsheet::{Cell, Grid};
use crate::store::JsonStore;
use crate::timesheet::{EntryDetail, TimesheetEntry};

// Scratch directory per test so tests can run in parallel
pub fn scratch_dir(test_name: &str) -> PathBuf {
    PathBuf::from(format!("./test_timesheet_db_{}", test_name))
}

pub fn setup(test_name: &str) -> JsonStore {
    teardown(test_name); // Clean any previous test data first
    let store = JsonStore::new(scratch_dir(test_name));
    store.bootstrap().expect("Failed to bootstrap scratch store");
    store
}

pub fn teardown(test_name: &str) {
    let _ = fs::remove_dir_all(scratch_dir(test_name));
}

/// One dated column of the `Result` sheet: (date, time slot, data cell).
pub type Column<'a> = (u32, &'a str, &'a str);

/// Builds an `.xlsx` with a `Result` sheet laid out like the timesheet export.
/// `year: None` leaves the year cell empty.
pub fn timesheet_workbook(year: Option<i32>, month: u32, name: &str, columns: &[Column]) -> Vec<u8> {
    workbook_with_sheet("Result", year, month, name, columns)
}

pub fn workbook_with_sheet(
    sheet_name: &str,
    year: Option<i32>,
    month: u32,
    name: &str,
    columns: &[Column],
) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).unwrap();

    worksheet.write_string(0, 0, "Timesheet").unwrap();
    worksheet.write_string(2, 0, "Year").unwrap();
    if let Some(year) = year {
        worksheet.write_number(2, 1, year as f64).unwrap();
    }
    worksheet.write_string(2, 2, "Month").unwrap();
    worksheet.write_number(2, 3, month as f64).unwrap();
    worksheet.write_string(8, 0, name).unwrap();

    for (i, (date, slot, marker)) in columns.iter().enumerate() {
        let col = (i + 1) as u16;
        worksheet.write_number(6, col, *date as f64).unwrap();
        worksheet.write_string(7, col, *slot).unwrap();
        worksheet.write_string(8, col, *marker).unwrap();
    }

    workbook.save_to_buffer().unwrap()
}

/// The same layout as [`timesheet_workbook`], as an in-memory grid.
pub fn result_grid(year: Cell, month: Cell, name: &str, columns: &[Column]) -> Grid {
    let width = columns.len() + 1;
    let mut rows = vec![vec![Cell::Empty; width]; 9];
    set_cell(&mut rows, 2, 1, year);
    set_cell(&mut rows, 2, 3, month);
    rows[8][0] = Cell::Text(name.to_string());
    for (i, (date, slot, marker)) in columns.iter().enumerate() {
        rows[6][i + 1] = Cell::Number(*date as f64);
        rows[7][i + 1] = Cell::Text(slot.to_string());
        rows[8][i + 1] = Cell::Text(marker.to_string());
    }
    Grid::new("Result", rows)
}

fn set_cell(rows: &mut [Vec<Cell>], row: usize, col: usize, value: Cell) {
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, Cell::Empty);
    }
    cells[col] = value;
}

pub fn work_entry(year: i32, month: u32, date: u32, slot: &str, cell: &str) -> TimesheetEntry {
    TimesheetEntry {
        year,
        month,
        date,
        time_slot: slot.to_string(),
        detail: EntryDetail::from_marker(cell),
    }
}
