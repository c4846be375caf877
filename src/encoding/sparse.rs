// isocrab - GPL-3.0-or-later
// This file is part of isocrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// isocrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// isocrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with isocrab.  If not, see <https://www.gnu.org/licenses/>.

//! Compressed sparse row matrix.
//!
//! One-hot encoding free-text columns like `message` produces roughly one
//! feature per row, so the dense matrix would be quadratic in the input size.

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    n_cols: usize,
    /// Start of each row in `indices`/`values`, `n_rows + 1` entries
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Empty matrix with a fixed column count, rows are appended with [`Self::push_row`]
    #[must_use]
    pub fn with_cols(n_cols: usize) -> Self {
        Self {
            n_cols,
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from dense rows, dropping zeros
    #[cfg(test)]
    pub fn from_dense(rows: &[Vec<f64>]) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut matrix = Self::with_cols(n_cols);
        for row in rows {
            if row.len() != n_cols {
                bail!("Ragged dense input: expected {n_cols} columns, got {}", row.len());
            }
            let entries: Vec<(usize, f64)> = row
                .iter()
                .copied()
                .enumerate()
                .filter(|&(_, v)| v != 0.0)
                .collect();
            matrix.push_row(&entries)?;
        }
        Ok(matrix)
    }

    /// Append a row given as `(column, value)` pairs with strictly increasing columns
    pub fn push_row(&mut self, entries: &[(usize, f64)]) -> Result<()> {
        let mut last = None;
        for &(col, _) in entries {
            if col >= self.n_cols {
                bail!("Column {col} out of range for {} columns", self.n_cols);
            }
            if last.is_some_and(|prev| prev >= col) {
                bail!("Row entries must have strictly increasing columns");
            }
            last = Some(col);
        }
        for &(col, value) in entries {
            self.indices.push(col);
            self.values.push(value);
        }
        self.indptr.push(self.indices.len());
        Ok(())
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of explicitly stored entries
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Stored entries of one row, sorted by column
    #[must_use]
    pub fn row(&self, row: usize) -> SparseRow<'_> {
        let range = self.indptr[row]..self.indptr[row + 1];
        SparseRow {
            indices: &self.indices[range.clone()],
            values: &self.values[range],
        }
    }
}

/// Borrowed view of one matrix row
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    indices: &'a [usize],
    values: &'a [f64],
}

impl<'a> SparseRow<'a> {
    /// Value at `col`, zero when not stored
    #[must_use]
    pub fn get(&self, col: usize) -> f64 {
        self.indices
            .binary_search(&col)
            .map_or(0.0, |pos| self.values[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        let (indices, values) = (self.indices, self.values);
        indices.iter().copied().zip(values.iter().copied())
    }

    #[must_use]
    pub const fn nnz(&self) -> usize {
        self.indices.len()
    }
}
