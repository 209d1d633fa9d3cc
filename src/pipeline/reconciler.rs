//! Sheet reconciliation
//!
//! Merges one [`Aggregate`] into the persisted table:
//!
//! ```text
//! read snapshot (A:last count column)
//!     ↓
//! per aggregate entry: match (label, handle) → cell update
//!                      no match              → append full row
//!     ↓
//! writes issued one by one, in plan order (spaced by the store's throttle)
//! ```
//!
//! The snapshot is updated in memory as the plan is built, so a key that
//! appears twice in one call hits the row created or updated by the first.
//!
//! Reconciliations are independent read-modify-write cycles. Two of them
//! racing on the same row can both read the same count, and one increment is
//! lost. `SheetReconciler::serialized` closes that window for callers sharing
//! one reconciler; the default leaves it open.

use super::types::{Aggregate, IdentityKey};
use crate::sheets::{Cell, SheetRange, StoreError, TabularStore};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Identity columns come first, count columns follow in channel order.
pub const IDENTITY_COLUMNS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub sheet_name: String,
    /// Number of monitored channels, one count column each
    pub count_columns: usize,
}

impl SheetLayout {
    pub fn new(sheet_name: impl Into<String>, count_columns: usize) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            count_columns,
        }
    }

    /// Total row width: identity plus count columns
    pub fn width(&self) -> usize {
        IDENTITY_COLUMNS + self.count_columns
    }

    /// Sheet column (zero-based) holding channel column `column`
    pub fn sheet_column(&self, column: usize) -> usize {
        IDENTITY_COLUMNS + column
    }

    /// The full table, identity and count columns
    pub fn table_range(&self) -> SheetRange {
        SheetRange::columns(&self.sheet_name, 0, self.width() - 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    /// Replace one count cell
    Update { range: SheetRange, value: i64 },
    /// Write a brand new row after the last one
    Append { range: SheetRange, row: Vec<Cell> },
}

impl PlannedWrite {
    pub fn range(&self) -> &SheetRange {
        match self {
            PlannedWrite::Update { range, .. } | PlannedWrite::Append { range, .. } => range,
        }
    }

    fn into_values(self) -> (SheetRange, Vec<Vec<Cell>>) {
        match self {
            PlannedWrite::Update { range, value } => (range, vec![vec![Cell::Int(value)]]),
            PlannedWrite::Append { range, row } => (range, vec![row]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub updated: usize,
    pub appended: usize,
}

impl ReconcileOutcome {
    pub fn writes(&self) -> usize {
        self.updated + self.appended
    }
}

/// Textual form of an identity cell. Numbers compare by their decimal form,
/// since a handle made of digits may come back from the sheet as a number.
fn cell_text(cell: &Cell) -> Cow<'_, str> {
    match cell {
        Cell::Text(s) => Cow::Borrowed(s.as_str()),
        Cell::Int(n) => Cow::Owned(n.to_string()),
        Cell::Float(f) => Cow::Owned(f.to_string()),
        Cell::Bool(b) => Cow::Owned(b.to_string()),
    }
}

fn row_matches(row: &[Cell], key: &IdentityKey) -> bool {
    match (row.first(), row.get(1)) {
        (Some(label), Some(handle)) => {
            cell_text(label) == key.display_label.as_str() && cell_text(handle) == key.handle.as_str()
        }
        _ => false,
    }
}

/// Build the write plan for `aggregate` against `snapshot`, updating the
/// snapshot to the state it will have once every write has landed.
pub fn plan_writes(
    snapshot: &mut Vec<Vec<Cell>>,
    aggregate: &Aggregate,
    layout: &SheetLayout,
) -> Result<Vec<PlannedWrite>, StoreError> {
    if aggregate.column() >= layout.count_columns {
        return Err(StoreError::InvalidRange(format!(
            "count column {} outside the {} configured channels",
            aggregate.column(),
            layout.count_columns
        )));
    }

    let target = layout.sheet_column(aggregate.column());
    let mut plan = Vec::with_capacity(aggregate.len());

    for (key, increment) in aggregate.iter() {
        match snapshot.iter().position(|row| row_matches(row, key)) {
            Some(position) => {
                let row = &mut snapshot[position];
                if row.len() <= target {
                    row.resize(target + 1, Cell::empty());
                }
                let value = row[target].as_count() + increment;
                row[target] = Cell::Int(value);
                plan.push(PlannedWrite::Update {
                    range: SheetRange::cell(&layout.sheet_name, target, position + 1),
                    value,
                });
            }
            None => {
                let mut row = Vec::with_capacity(layout.width());
                row.push(Cell::text(key.display_label.clone()));
                row.push(Cell::text(key.handle.clone()));
                row.extend((0..layout.count_columns).map(|_| Cell::Int(0)));
                row[target] = Cell::Int(increment);

                let sheet_row = snapshot.len() + 1;
                snapshot.push(row.clone());
                plan.push(PlannedWrite::Append {
                    range: SheetRange::row(&layout.sheet_name, sheet_row, 0, layout.width() - 1),
                    row,
                });
            }
        }
    }

    Ok(plan)
}

pub struct SheetReconciler {
    store: Arc<dyn TabularStore>,
    layout: SheetLayout,
    write_lock: Option<Mutex<()>>,
}

impl SheetReconciler {
    pub fn new(store: Arc<dyn TabularStore>, layout: SheetLayout) -> Self {
        Self {
            store,
            layout,
            write_lock: None,
        }
    }

    /// Reconciler that runs one reconciliation at a time, so concurrent
    /// callers never read a snapshot another call is about to change.
    pub fn serialized(store: Arc<dyn TabularStore>, layout: SheetLayout) -> Self {
        Self {
            write_lock: Some(Mutex::new(())),
            ..Self::new(store, layout)
        }
    }

    pub fn is_serialized(&self) -> bool {
        self.write_lock.is_some()
    }

    /// Merge `aggregate` into the table. An empty aggregate touches nothing.
    ///
    /// Writes are not rolled back: if one fails, the ones before it stay
    /// applied and the error is returned.
    pub async fn reconcile(&self, aggregate: &Aggregate) -> Result<ReconcileOutcome, StoreError> {
        if aggregate.is_empty() {
            return Ok(ReconcileOutcome::default());
        }

        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut snapshot = self.store.read_range(&self.layout.table_range()).await?;
        let plan = plan_writes(&mut snapshot, aggregate, &self.layout)?;

        let mut outcome = ReconcileOutcome::default();
        for write in plan {
            let is_append = matches!(write, PlannedWrite::Append { .. });
            let (range, values) = write.into_values();
            log::debug!("   ├─ {} {}", if is_append { "append" } else { "update" }, range);
            self.store.write_range(&range, values).await?;
            if is_append {
                outcome.appended += 1;
            } else {
                outcome.updated += 1;
            }
        }

        log::debug!(
            "   └─ column {}: {} updated, {} appended",
            aggregate.column(),
            outcome.updated,
            outcome.appended
        );
        Ok(outcome)
    }
}
