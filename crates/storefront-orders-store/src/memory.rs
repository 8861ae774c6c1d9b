//! In-memory spreadsheet for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::gateway::{Row, SheetsGateway};

/// A [`SheetsGateway`] backed by in-process vectors.
///
/// Supports failure injection, artificial latency and call counters so tests
/// can observe how often the spreadsheet is actually hit.
#[derive(Debug, Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<String, Vec<Row>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency: Mutex<Duration>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemorySheets {
    /// Create an empty spreadsheet with no sheets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet whose first row is `header`.
    #[must_use]
    pub fn with_sheet(self, name: &str, header: &[&str]) -> Self {
        self.lock().insert(
            name.to_string(),
            vec![header.iter().map(|cell| (*cell).to_string()).collect()],
        );
        self
    }

    /// Append a row directly, bypassing counters and failure injection.
    pub fn push_row(&self, sheet: &str, row: &[&str]) {
        self.lock()
            .entry(sheet.to_string())
            .or_default()
            .push(row.iter().map(|cell| (*cell).to_string()).collect());
    }

    /// Snapshot of every row in `sheet`, header included.
    #[must_use]
    pub fn rows(&self, sheet: &str) -> Vec<Row> {
        self.lock().get(sheet).cloned().unwrap_or_default()
    }

    /// Edit one cell directly, as an operator would in the spreadsheet UI.
    ///
    /// Returns `false` if the row does not exist.
    pub fn set_cell(&self, sheet: &str, row_number: usize, column: usize, value: &str) -> bool {
        let mut sheets = self.lock();
        let Some(row) = sheets
            .get_mut(sheet)
            .and_then(|rows| rows.get_mut(row_number.checked_sub(1)?))
        else {
            return false;
        };
        if row.len() <= column {
            row.resize(column + 1, String::new());
        }
        row[column] = value.to_string();
        true
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent append or update fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of read calls served or failed.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of append and update calls served or failed.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Row>>> {
        self.sheets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_write(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("injected write failure".into()));
        }
        Ok(())
    }
}

fn unknown_sheet(sheet: &str) -> GatewayError {
    GatewayError::Api {
        status: 400,
        message: format!("Unable to parse range: {sheet}"),
    }
}

#[async_trait]
impl SheetsGateway for MemorySheets {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Row>> {
        self.simulate_latency().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("injected read failure".into()));
        }
        self.lock()
            .get(sheet)
            .cloned()
            .ok_or_else(|| unknown_sheet(sheet))
    }

    async fn append_row(&self, sheet: &str, row: Row) -> Result<()> {
        self.simulate_latency().await;
        self.check_write()?;
        self.lock()
            .get_mut(sheet)
            .ok_or_else(|| unknown_sheet(sheet))?
            .push(row);
        Ok(())
    }

    async fn update_row(&self, sheet: &str, row_number: usize, row: Row) -> Result<()> {
        self.simulate_latency().await;
        self.check_write()?;
        let index = row_number
            .checked_sub(1)
            .ok_or_else(|| GatewayError::Malformed("row numbers start at 1".into()))?;
        let mut sheets = self.lock();
        let rows = sheets.get_mut(sheet).ok_or_else(|| unknown_sheet(sheet))?;
        if rows.len() <= index {
            rows.resize(index + 1, Row::new());
        }
        rows[index] = row;
        Ok(())
    }
}
