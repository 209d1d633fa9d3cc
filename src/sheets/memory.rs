//! In-process sheet backend
//!
//! Behaves like a single Google Sheets tab for the calls the reconciler makes:
//! reads drop trailing blank cells and rows, writes grow the grid as needed.
//! Used for `STORE_BACKEND=memory` dry runs and throughout the tests, which is
//! why it counts calls and can be told to fail.

use super::{Cell, SheetRange, StoreError, TabularStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct InMemorySheet {
    name: String,
    rows: Mutex<Vec<Vec<Cell>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    write_log: Mutex<Vec<String>>,
    fail_reads: AtomicBool,
    /// Writes allowed before every further write fails
    write_budget: Mutex<Option<usize>>,
}

impl InMemorySheet {
    pub fn new(name: &str) -> Self {
        Self::with_rows(name, Vec::new())
    }

    pub fn with_rows(name: &str, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.to_string(),
            rows: Mutex::new(rows),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            write_log: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            write_budget: Mutex::new(None),
        }
    }

    /// Current grid contents
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// A1 ranges of every successful write, in order
    pub fn write_log(&self) -> Vec<String> {
        self.write_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more writes succeed, then fail every write after that.
    pub fn fail_writes_after(&self, n: usize) {
        if let Ok(mut budget) = self.write_budget.lock() {
            *budget = Some(n);
        }
    }

    fn check_sheet(&self, range: &SheetRange) -> Result<(), StoreError> {
        if range.sheet() != self.name {
            return Err(StoreError::Api {
                status: 400,
                message: format!("Unable to parse range: {}", range),
            });
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Api {
            status: 500,
            message: "in-memory sheet lock poisoned".to_string(),
        }
    }
}

/// (first col, first row, last col, last row); rows unbounded for whole-column ranges
fn bounds(range: &SheetRange) -> (usize, usize, usize, Option<usize>) {
    match range {
        SheetRange::Columns { first, last, .. } => (*first, 1, *last, None),
        SheetRange::Block {
            first_col,
            first_row,
            last_col,
            last_row,
            ..
        } => (*first_col, *first_row, *last_col, Some(*last_row)),
    }
}

#[async_trait]
impl TabularStore for InMemorySheet {
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<Cell>>, StoreError> {
        self.check_sheet(range)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "read failure injected".to_string(),
            });
        }

        let (first_col, first_row, last_col, last_row) = bounds(range);
        let rows = self.rows.lock().map_err(|_| Self::poisoned())?;
        let end_row = last_row.unwrap_or(rows.len()).min(rows.len());

        let mut values: Vec<Vec<Cell>> = Vec::new();
        for row in rows.iter().take(end_row).skip(first_row.saturating_sub(1)) {
            let mut cells: Vec<Cell> = row
                .iter()
                .skip(first_col)
                .take(last_col + 1 - first_col)
                .cloned()
                .collect();
            while cells.last().is_some_and(Cell::is_blank) {
                cells.pop();
            }
            values.push(cells);
        }
        while values.last().is_some_and(|row| row.is_empty()) {
            values.pop();
        }

        Ok(values)
    }

    async fn write_range(&self, range: &SheetRange, values: Vec<Vec<Cell>>) -> Result<(), StoreError> {
        self.check_sheet(range)?;

        {
            let mut budget = self.write_budget.lock().map_err(|_| Self::poisoned())?;
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(StoreError::Api {
                        status: 429,
                        message: "write failure injected".to_string(),
                    });
                }
                *remaining -= 1;
            }
        }

        let (first_col, first_row, last_col, last_row) = bounds(range);
        let width = last_col + 1 - first_col;
        let height = last_row.map(|last| last + 1 - first_row);
        if values.iter().any(|row| row.len() > width) || height.is_some_and(|h| values.len() > h) {
            return Err(StoreError::InvalidRange(format!(
                "{} rows of data do not fit {}",
                values.len(),
                range
            )));
        }

        let mut rows = self.rows.lock().map_err(|_| Self::poisoned())?;
        for (offset, new_row) in values.into_iter().enumerate() {
            let row_index = first_row - 1 + offset;
            if rows.len() <= row_index {
                rows.resize(row_index + 1, Vec::new());
            }
            let row = &mut rows[row_index];
            for (col_offset, cell) in new_row.into_iter().enumerate() {
                let col = first_col + col_offset;
                if row.len() <= col {
                    row.resize(col + 1, Cell::empty());
                }
                row[col] = cell;
            }
        }
        drop(rows);

        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.write_log.lock() {
            log.push(range.to_a1());
        }
        log::info!("📝 [{}] wrote {}", self.backend_type(), range);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
