// src/ingest.rs
use std::collections::HashSet;

use tracing::{debug, info};

use crate::spreadsheet::{read_sheet, Cell, Grid, SheetError};
use crate::timesheet::{employee_key, sort_entries, DedupKey, EntryDetail, TimesheetEntry};

// --- Sheet Layout ---

/// Where each piece of the timesheet lives on the sheet. Positions are 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub sheet_name: &'static str,
    pub period_row: usize,
    pub year_col: usize,
    pub month_col: usize,
    pub date_row: usize,
    pub slot_row: usize,
    pub data_row: usize,
    pub name_col: usize,
    pub first_slot_col: usize,
}

impl SheetLayout {
    /// The layout produced by the timesheet export ("Result" sheet).
    pub const RESULT: SheetLayout = SheetLayout {
        sheet_name: "Result",
        period_row: 2,
        year_col: 1,
        month_col: 3,
        date_row: 6,
        slot_row: 7,
        data_row: 8,
        name_col: 0,
        first_slot_col: 1,
    };
}

/// Entries read from one sheet, before merging with the stored collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTimesheet {
    pub employee_name: String,
    pub employee_key: String,
    pub year: i32,
    pub month: u32,
    pub entries: Vec<TimesheetEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub entries: Vec<TimesheetEntry>,
    pub added: usize,
    pub skipped: usize,
}

// --- Parsing ---

/// Reads the `Result` sheet out of raw `.xlsx` bytes.
pub fn parse_workbook(bytes: &[u8]) -> Result<ParsedTimesheet, SheetError> {
    let layout = SheetLayout::RESULT;
    let grid = read_sheet(bytes, layout.sheet_name)?;
    parse_grid(&grid, &layout)
}

/// Validates the period and employee cells, then reads one entry per dated column.
pub fn parse_grid(grid: &Grid, layout: &SheetLayout) -> Result<ParsedTimesheet, SheetError> {
    let year = whole_number(grid, layout.period_row, layout.year_col, "Year")?;
    let month = whole_number(grid, layout.period_row, layout.month_col, "Month")?;
    if !(1..=12).contains(&month) {
        return Err(SheetError::OutOfRange {
            what: "Month".to_string(),
            cell: grid.cell_ref(layout.period_row, layout.month_col),
            value: month,
        });
    }
    let year = i32::try_from(year).map_err(|_| SheetError::OutOfRange {
        what: "Year".to_string(),
        cell: grid.cell_ref(layout.period_row, layout.year_col),
        value: year,
    })?;
    let month = month as u32;

    let name_cell = grid.cell(layout.data_row, layout.name_col);
    let employee_name = match name_cell.as_text() {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            return Err(SheetError::MissingValue {
                what: "Employee name".to_string(),
                cell: grid.cell_ref(layout.data_row, layout.name_col),
            })
        }
    };

    let mut entries = Vec::new();
    for col in layout.first_slot_col..grid.width() {
        if grid.cell(layout.date_row, col).is_blank() {
            continue;
        }
        let date = whole_number(grid, layout.date_row, col, "Date")?;
        if !(1..=31).contains(&date) {
            return Err(SheetError::OutOfRange {
                what: "Date".to_string(),
                cell: grid.cell_ref(layout.date_row, col),
                value: date,
            });
        }

        let time_slot = required_text(grid, layout.slot_row, col, "Time slot")?;
        let marker = required_text(grid, layout.data_row, col, "Timesheet entry")?;

        entries.push(TimesheetEntry {
            year,
            month,
            date: date as u32,
            time_slot,
            detail: EntryDetail::from_marker(&marker),
        });
    }

    debug!(
        "Parsed {} dated columns for '{}' ({}-{:02})",
        entries.len(),
        employee_name,
        year,
        month
    );

    Ok(ParsedTimesheet {
        employee_key: employee_key(&employee_name),
        employee_name,
        year,
        month,
        entries,
    })
}

/// Numeric cell truncated toward zero, as spreadsheet exports often store `2025.0`.
fn whole_number(grid: &Grid, row: usize, col: usize, what: &str) -> Result<i64, SheetError> {
    let cell = grid.cell(row, col);
    if cell.is_blank() {
        return Err(SheetError::MissingValue {
            what: what.to_string(),
            cell: grid.cell_ref(row, col),
        });
    }
    match cell.as_number() {
        Some(n) if n.is_finite() => Ok(n.trunc() as i64),
        _ => Err(SheetError::NotNumeric {
            what: what.to_string(),
            cell: grid.cell_ref(row, col),
            value: describe(cell),
        }),
    }
}

fn required_text(grid: &Grid, row: usize, col: usize, what: &str) -> Result<String, SheetError> {
    let cell = grid.cell(row, col);
    match cell.as_text() {
        Some(text) if !cell.is_blank() => Ok(text),
        _ => Err(SheetError::MissingValue {
            what: what.to_string(),
            cell: grid.cell_ref(row, col),
        }),
    }
}

fn describe(cell: &Cell) -> String {
    cell.as_text().unwrap_or_default()
}

// --- Merging ---

/// Appends every incoming entry whose slot is not already taken, then re-sorts.
///
/// The first entry seen for a slot is kept: stored entries win over uploads and
/// earlier columns win over later ones.
pub fn merge_entries(existing: Vec<TimesheetEntry>, incoming: Vec<TimesheetEntry>) -> MergeOutcome {
    let mut seen: HashSet<DedupKey> = existing.iter().map(TimesheetEntry::key).collect();
    let mut entries = existing;
    let mut added = 0;
    let mut skipped = 0;

    for entry in incoming {
        if seen.insert(entry.key()) {
            entries.push(entry);
            added += 1;
        } else {
            debug!("Skipping duplicate slot {}", entry.key());
            skipped += 1;
        }
    }

    sort_entries(&mut entries);
    info!(
        "Merged timesheet: {} added, {} duplicates skipped, {} total",
        added,
        skipped,
        entries.len()
    );

    MergeOutcome {
        entries,
        added,
        skipped,
    }
}
