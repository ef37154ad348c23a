// src/spreadsheet.rs
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

// --- Spreadsheet Errors ---

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetError {
    #[error("Worksheet '{0}' not found in the workbook.")]
    MissingSheet(String),

    #[error("{what} is missing in the Excel file ({cell}).")]
    MissingValue { what: String, cell: String },

    #[error("{what} at {cell} is not a number: '{value}'.")]
    NotNumeric {
        what: String,
        cell: String,
        value: String,
    },

    #[error("{what} at {cell} is out of range: {value}.")]
    OutOfRange {
        what: String,
        cell: String,
        value: i64,
    },

    #[error("{0}")]
    Workbook(String),
}

// --- Cell Grid ---

/// A single cell value, reduced to the shapes the timesheet layout cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view: numbers as-is, text parsed as a float.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Text view. Integral numbers print without a fractional part.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::String(String::new()),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Value::from(*n as i64)
            }
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// Sheet contents addressed by absolute, 0-indexed `(row, column)` positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub sheet_name: String,
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(sheet_name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            rows,
        }
    }

    /// Calamine ranges start at the first used cell; pad so positions stay absolute.
    fn from_range(sheet_name: &str, range: &Range<Data>) -> Self {
        let (row_offset, col_offset) = match range.start() {
            Some((r, c)) => (r as usize, c as usize),
            None => return Self::new(sheet_name, Vec::new()),
        };

        let mut rows = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col_offset];
            cells.extend(row.iter().map(Cell::from));
            rows.push(cells);
        }
        Self::new(sheet_name, rows)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row in the sheet.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Sheet-qualified A1 reference, e.g. `Result!B3`.
    pub fn cell_ref(&self, row: usize, col: usize) -> String {
        format!("{}!{}{}", self.sheet_name, column_letters(col), row + 1)
    }
}

/// 0-indexed column to spreadsheet letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

// --- Workbook Access ---

fn open_xlsx(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>, SheetError> {
    open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| SheetError::Workbook(format!("Failed to open workbook: {}", e)))
}

/// Reads one named worksheet into a [`Grid`].
pub fn read_sheet(bytes: &[u8], sheet_name: &str) -> Result<Grid, SheetError> {
    let mut workbook = open_xlsx(bytes)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
        return Err(SheetError::MissingSheet(sheet_name.to_string()));
    }
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| SheetError::Workbook(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;
    let grid = Grid::from_range(sheet_name, &range);
    debug!(
        "Read sheet '{}' ({} rows x {} columns)",
        sheet_name,
        grid.height(),
        grid.width()
    );
    Ok(grid)
}

/// Reads the first worksheet as records keyed by its header row.
pub fn preview_first_sheet(bytes: &[u8]) -> Result<Vec<Map<String, Value>>, SheetError> {
    let mut workbook = open_xlsx(bytes)?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SheetError::Workbook("Workbook contains no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| SheetError::Workbook(format!("Failed to read sheet '{}': {}", first, e)))?;

    let mut rows = range.rows().map(|row| row.iter().map(Cell::from).collect::<Vec<_>>());
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers = header_names(&header_row);

    Ok(rows
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = cells.get(i).unwrap_or(&EMPTY_CELL).to_json();
                    (header.clone(), value)
                })
                .collect()
        })
        .collect())
}

/// Blank headers become `Unnamed: <n>`, repeated ones get a `.1`, `.2` suffix.
fn header_names(header_row: &[Cell]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header_row.len());
    for (i, cell) in header_row.iter().enumerate() {
        let base = match cell.as_text() {
            Some(text) if !text.trim().is_empty() => text,
            _ => format!("Unnamed: {}", i),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while names.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }
    names
}
