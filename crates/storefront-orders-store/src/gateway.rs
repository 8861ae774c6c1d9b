//! Spreadsheet access trait.
//!
//! The gateway speaks in raw rows of cell strings. Callers always reach it
//! through a [`crate::RateLimiter`]; the order and admin layers own the
//! mapping between rows and domain types.

use async_trait::async_trait;

use crate::error::Result;

/// One spreadsheet row, as cell strings.
pub type Row = Vec<String>;

/// Authenticated row access to a spreadsheet.
///
/// Row numbers are 1-based sheet rows; the header, when present, is row 1.
#[async_trait]
pub trait SheetsGateway: Send + Sync {
    /// Read every row of `sheet`, header included.
    ///
    /// Element `i` of the result is sheet row `i + 1`. Trailing empty cells may
    /// be omitted, so rows can be shorter than the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the sheet cannot be read.
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Row>>;

    /// Append `row` after the last row of `sheet`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn append_row(&self, sheet: &str, row: Row) -> Result<()>;

    /// Overwrite sheet row `row_number` of `sheet` with `row`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn update_row(&self, sheet: &str, row_number: usize, row: Row) -> Result<()>;
}
