//! Tabular store boundary
//!
//! The reconciler sees the sheet as a rectangular grid of [`Cell`]s reachable
//! through [`TabularStore`]. Two backends:
//!
//! - `client` - Google Sheets v4 REST API with a service-account key
//! - `memory` - in-process grid, used for dry runs and tests
//!
//! Writes go through [`ThrottledStore`], which spaces them by the configured
//! update delay regardless of which task issues them.

pub mod auth;
pub mod backoff;
pub mod client;
pub mod memory;
pub mod range;

pub use client::GoogleSheetsClient;
pub use memory::InMemorySheet;
pub use range::{column_letters, SheetRange};

use crate::throttle::Throttle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid credentials: {0}")]
    Credentials(String),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid range: {0}")]
    InvalidRange(String),
}

impl From<jsonwebtoken::errors::Error> for StoreError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        StoreError::Auth(err.to_string())
    }
}

/// One spreadsheet cell as returned by an unformatted read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Text(s) if s.trim().is_empty())
    }

    /// Text content, None for numeric and boolean cells
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read the cell as a count: integers as-is, floats truncated, text by
    /// its leading integer ("12 pings" → 12). Blank or unparsable → 0.
    pub fn as_count(&self) -> i64 {
        match self {
            Cell::Int(n) => *n,
            Cell::Float(f) if f.is_finite() => f.trunc() as i64,
            Cell::Float(_) | Cell::Bool(_) => 0,
            Cell::Text(s) => leading_integer(s).unwrap_or(0),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Read a range, row-major. Trailing empty rows and cells may be omitted,
    /// so rows can be shorter than the range.
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<Cell>>, StoreError>;

    /// Overwrite a range with `values`, row-major.
    async fn write_range(&self, range: &SheetRange, values: Vec<Vec<Cell>>) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

/// Spaces writes to the wrapped store by a shared [`Throttle`]. Reads pass through.
pub struct ThrottledStore {
    inner: Arc<dyn TabularStore>,
    throttle: Throttle,
}

impl ThrottledStore {
    pub fn new(inner: Arc<dyn TabularStore>, throttle: Throttle) -> Self {
        Self { inner, throttle }
    }
}

#[async_trait]
impl TabularStore for ThrottledStore {
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<Cell>>, StoreError> {
        self.inner.read_range(range).await
    }

    async fn write_range(&self, range: &SheetRange, values: Vec<Vec<Cell>>) -> Result<(), StoreError> {
        self.throttle.acquire().await;
        self.inner.write_range(range, values).await
    }

    fn backend_type(&self) -> &'static str {
        self.inner.backend_type()
    }
}
