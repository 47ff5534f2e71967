//! Moving transactions in and out of the application: CSV export and
//! import, and printable account statements.

pub mod http;
mod pdf;
mod rows;
pub mod services;

use chrono::NaiveDate;
use serde::Serialize;

pub use pdf::{render_statement, Statement};
pub use rows::{parse_rows, write_rows, CsvRow};

/// The outcome of importing a CSV file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub errors: Vec<RowError>,
}

/// A row that could not be imported.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// The row's line in the file, counting the header as line 1.
    pub line: usize,
    pub message: String,
}

/// An inclusive date range a report covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}
