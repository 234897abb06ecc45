//! Spreadsheet reading and writing for the built-in script.
//!
//! Only the first worksheet is used. Row 1 is the header row; every later
//! row is a data row with one cell per header.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// One cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date (days since 1899-12-30, fraction is time of day)
    DateTime(f64),
}

impl Cell {
    /// Calendar value of a `DateTime` cell
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(serial) => serial_to_datetime(*serial),
            _ => None,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Header row plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell by data-row index and header name
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }
}

/// Outcome of adding a constant to one column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncrementReport {
    /// Rows whose cell was incremented
    pub updated: usize,
    /// Data-row indexes left unchanged because the cell was not numeric
    pub skipped: Vec<usize>,
    /// The column does not exist in the header row
    pub missing_column: bool,
}

impl IncrementReport {
    /// Every data row was updated
    pub fn is_clean(&self) -> bool {
        !self.missing_column && self.skipped.is_empty()
    }
}

/// Read the first worksheet of `path`
pub fn read_sheet(path: &Path) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => {
            range.with_context(|| format!("Failed to read first worksheet: {}", path.display()))?
        }
        None => return Ok(Sheet::default()),
    };

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
        None => return Ok(Sheet::default()),
    };

    let width = headers.len();
    let rows = rows
        .map(|row| {
            let mut cells: Vec<Cell> = row.iter().take(width).map(Cell::from).collect();
            cells.resize(width, Cell::Empty);
            cells
        })
        .collect();

    Ok(Sheet { headers, rows })
}

/// Add `amount` to every numeric cell of `column`
pub fn increment_column(sheet: &mut Sheet, column: &str, amount: f64) -> IncrementReport {
    let mut report = IncrementReport::default();

    let Some(col) = sheet.column_index(column) else {
        report.missing_column = true;
        return report;
    };

    for (index, row) in sheet.rows.iter_mut().enumerate() {
        match row.get_mut(col) {
            Some(Cell::Number(value)) => {
                *value += amount;
                report.updated += 1;
            }
            _ => report.skipped.push(index),
        }
    }

    report
}

/// Write `sheet` as a new single-worksheet workbook
pub fn write_sheet(path: &Path, sheet: &Sheet) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string(0, column_number(col)?, header.as_str())?;
    }

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_number = u32::try_from(index + 1).context("Too many rows for a worksheet")?;
        for (col, cell) in row.iter().enumerate() {
            let col = column_number(col)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => {
                    worksheet.write_string(row_number, col, text.as_str())?;
                }
                Cell::Number(number) => {
                    worksheet.write_number(row_number, col, *number)?;
                }
                Cell::Bool(value) => {
                    worksheet.write_boolean(row_number, col, *value)?;
                }
                Cell::DateTime(serial) => {
                    let format = if serial.fract() == 0.0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_number_with_format(row_number, col, *serial, format)?;
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook: {}", path.display()))
}

/// Excel serial to calendar time, using the 1900 date system
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn column_number(col: usize) -> Result<u16> {
    u16::try_from(col).context("Too many columns for a worksheet")
}
