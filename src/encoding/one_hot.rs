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

//! One-hot encoding of text columns into a sparse feature matrix.

use crate::core::LogTable;
use crate::encoding::sparse::SparseMatrix;
use anyhow::Result;
use indexmap::IndexMap;

/// Categories of one encoded column, in feature order
#[derive(Debug, Clone)]
struct ColumnCategories {
    name: String,
    /// Category -> feature index relative to `offset`
    categories: IndexMap<String, usize>,
    offset: usize,
}

/// Fitted one-hot encoder.
///
/// Categories are sorted per column and the feature blocks are laid out in
/// the order the columns were given. Values not seen during fitting encode
/// to an all-zero block.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    columns: Vec<ColumnCategories>,
    n_features: usize,
}

impl OneHotEncoder {
    /// Learn the categories of `columns` from `table`
    pub fn fit<S: AsRef<str>>(table: &LogTable, columns: &[S]) -> Result<Self> {
        let indices = table.require_columns(columns)?;

        let mut encoded = Vec::with_capacity(columns.len());
        let mut offset = 0;
        for (name, col_idx) in columns.iter().zip(indices) {
            let mut values: Vec<&str> = table
                .rows()
                .iter()
                .map(|row| row[col_idx].as_str())
                .collect();
            values.sort_unstable();
            values.dedup();

            let categories: IndexMap<String, usize> = values
                .into_iter()
                .enumerate()
                .map(|(idx, value)| (value.to_string(), idx))
                .collect();

            tracing::debug!(
                "Column '{}' has {} distinct values",
                name.as_ref(),
                categories.len()
            );

            let width = categories.len();
            encoded.push(ColumnCategories {
                name: name.as_ref().to_string(),
                categories,
                offset,
            });
            offset += width;
        }

        tracing::info!(
            "One-hot encoder fitted: {} columns -> {offset} features",
            encoded.len()
        );

        Ok(Self {
            columns: encoded,
            n_features: offset,
        })
    }

    /// Encode `table`, which must contain every fitted column
    pub fn transform(&self, table: &LogTable) -> Result<SparseMatrix> {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let indices = table.require_columns(names.as_slice())?;

        let mut matrix = SparseMatrix::with_cols(self.n_features);
        let mut unknown = 0usize;
        let mut entries = Vec::with_capacity(self.columns.len());
        for row in table.rows() {
            entries.clear();
            entries.extend(self.columns.iter().zip(&indices).filter_map(|(column, &col_idx)| {
                column
                    .categories
                    .get(row[col_idx].as_str())
                    .map(|&feature| (column.offset + feature, 1.0))
            }));
            unknown += self.columns.len() - entries.len();
            matrix.push_row(&entries)?;
        }

        if unknown > 0 {
            tracing::debug!("{unknown} cells held categories unseen during fit, encoded as zeros");
        }

        Ok(matrix)
    }

    pub fn fit_transform<S: AsRef<str>>(
        table: &LogTable,
        columns: &[S],
    ) -> Result<(Self, SparseMatrix)> {
        let encoder = Self::fit(table, columns)?;
        let matrix = encoder.transform(table)?;
        Ok((encoder, matrix))
    }

    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Feature names as `<column>_<category>`, in matrix column order
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|column| {
                column
                    .categories
                    .keys()
                    .map(move |category| format!("{}_{category}", column.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[&str; 3]]) -> LogTable {
        LogTable::new(
            vec!["id".into(), "path".into(), "message".into()],
            rows.iter()
                .map(|r| r.iter().map(|s| (*s).to_string()).collect())
                .collect(),
        )
        .expect("valid table")
    }

    #[test]
    fn test_categories_are_sorted_per_column() {
        let t = table(&[["1", "/b", "hello"], ["2", "/a", "bye"], ["3", "/b", "hello"]]);
        let encoder = OneHotEncoder::fit(&t, &["path", "message"]).expect("fit");

        assert_eq!(encoder.n_features(), 4);
        assert_eq!(
            encoder.feature_names(),
            ["path_/a", "path_/b", "message_bye", "message_hello"]
        );
    }

    #[test]
    fn test_one_active_feature_per_column() {
        let t = table(&[["1", "/b", "hello"], ["2", "/a", "bye"]]);
        let (_, m) = OneHotEncoder::fit_transform(&t, &["path", "message"]).expect("fit");

        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.row(0).iter().collect::<Vec<_>>(), [(1, 1.0), (3, 1.0)]);
        assert_eq!(m.row(1).iter().collect::<Vec<_>>(), [(0, 1.0), (2, 1.0)]);
    }

    #[test]
    fn test_unknown_categories_are_ignored() {
        let train = table(&[["1", "/a", "x"]]);
        let encoder = OneHotEncoder::fit(&train, &["path", "message"]).expect("fit");

        let other = table(&[["9", "/zzz", "x"]]);
        let m = encoder.transform(&other).expect("transform");
        assert_eq!(m.row(0).iter().collect::<Vec<_>>(), [(1, 1.0)]);
    }

    #[test]
    fn test_empty_cells_form_their_own_category() {
        let t = table(&[["1", "", "x"], ["2", "/a", "x"]]);
        let encoder = OneHotEncoder::fit(&t, &["path"]).expect("fit");
        assert_eq!(encoder.feature_names(), ["path_", "path_/a"]);
    }

    #[test]
    fn test_missing_column_fails() {
        let t = table(&[["1", "/a", "x"]]);
        assert!(OneHotEncoder::fit(&t, &["event.original"]).is_err());
    }
}
