//! Request grid validation and the resolved form handed to the composer.

use crate::{Error, Result};

/// A validated rectangular grid of image URLs.
///
/// Construction is the only validation point: a `Grid` that exists is
/// non-empty and strictly rectangular, so downstream stages never re-check
/// shape. The grid is immutable once built and lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Validate caller input into a `Grid`.
    ///
    /// Rejects an empty grid, any empty row, and ragged rows (every row must
    /// match the first row's length).
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::InvalidGrid("grid must not be empty".into()));
        }
        let columns = rows[0].len();
        if columns == 0 {
            return Err(Error::InvalidGrid("grid rows must not be empty".into()));
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns {
                return Err(Error::InvalidGrid(format!(
                    "row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    columns
                )));
            }
        }
        Ok(Self { rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows[0].len()
    }

    /// Cell URLs in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }
}

/// A grid whose cells have all been resolved to inline `data:` URIs.
///
/// Produced by the orchestrator after asset resolution; consumed by the
/// composer. Cells are stored row-major.
#[derive(Debug, Clone)]
pub struct ResolvedGrid {
    columns: usize,
    cells: Vec<String>,
}

impl ResolvedGrid {
    /// Pair a validated grid's shape with its resolved cell payloads.
    pub fn new(grid: &Grid, cells: Vec<String>) -> Self {
        debug_assert_eq!(cells.len(), grid.row_count() * grid.column_count());
        Self {
            columns: grid.column_count(),
            cells,
        }
    }

    pub fn row_count(&self) -> usize {
        self.cells.len() / self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(String::as_str)
    }
}
