//! A1 range addressing
//!
//! Columns are zero-based indices (0 = `A`), rows are one-based like in A1
//! notation itself.

use std::fmt;

/// Spreadsheet column letters for a zero-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quote a sheet name for use in a range when it needs it.
fn quoted_sheet(name: &str) -> String {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRange {
    /// Whole columns, e.g. `Sheet1!A:E`
    Columns {
        sheet: String,
        first: usize,
        last: usize,
    },
    /// Rectangle of cells, e.g. `Sheet1!A7:E7`, or `Sheet1!D7` for a single cell
    Block {
        sheet: String,
        first_col: usize,
        first_row: usize,
        last_col: usize,
        last_row: usize,
    },
}

impl SheetRange {
    pub fn columns(sheet: &str, first: usize, last: usize) -> Self {
        SheetRange::Columns {
            sheet: sheet.to_string(),
            first,
            last,
        }
    }

    pub fn cell(sheet: &str, col: usize, row: usize) -> Self {
        SheetRange::Block {
            sheet: sheet.to_string(),
            first_col: col,
            first_row: row,
            last_col: col,
            last_row: row,
        }
    }

    pub fn row(sheet: &str, row: usize, first_col: usize, last_col: usize) -> Self {
        SheetRange::Block {
            sheet: sheet.to_string(),
            first_col,
            first_row: row,
            last_col,
            last_row: row,
        }
    }

    pub fn sheet(&self) -> &str {
        match self {
            SheetRange::Columns { sheet, .. } | SheetRange::Block { sheet, .. } => sheet,
        }
    }

    /// A1 notation, including the sheet name
    pub fn to_a1(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetRange::Columns { sheet, first, last } => write!(
                f,
                "{}!{}:{}",
                quoted_sheet(sheet),
                column_letters(*first),
                column_letters(*last)
            ),
            SheetRange::Block {
                sheet,
                first_col,
                first_row,
                last_col,
                last_row,
            } => {
                if first_col == last_col && first_row == last_row {
                    write!(
                        f,
                        "{}!{}{}",
                        quoted_sheet(sheet),
                        column_letters(*first_col),
                        first_row
                    )
                } else {
                    write!(
                        f,
                        "{}!{}{}:{}{}",
                        quoted_sheet(sheet),
                        column_letters(*first_col),
                        first_row,
                        column_letters(*last_col),
                        last_row
                    )
                }
            }
        }
    }
}
