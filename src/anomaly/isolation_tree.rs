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

use crate::anomaly::average_path_length;
use crate::encoding::{SparseMatrix, SparseRow};
use rand::Rng;
use std::collections::BTreeMap;

/// Value range of one feature over the rows of a node
#[derive(Debug, Clone, Copy)]
struct FeatureRange {
    stored: usize,
    min: f64,
    max: f64,
}

/// A single random isolation tree
#[derive(Debug, Clone)]
pub enum IsolationTree {
    Split {
        feature: usize,
        threshold: f64,
        /// Rows with `value <= threshold`
        left: Box<IsolationTree>,
        right: Box<IsolationTree>,
    },
    Leaf {
        /// Training rows that ended up here
        size: usize,
    },
}

impl IsolationTree {
    /// Grow a tree on the given training rows.
    ///
    /// Each split picks a feature uniformly among those that are not constant
    /// over the node's rows, then a threshold uniformly in `[min, max)`.
    pub fn build(
        x: &SparseMatrix,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_rows = rows.len();
        if depth >= max_depth || n_rows <= 1 {
            return Self::Leaf { size: n_rows };
        }

        let candidates = Self::non_constant_features(x, &rows);
        if candidates.is_empty() {
            return Self::Leaf { size: n_rows };
        }

        let (feature, range) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(range.min..range.max);

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| x.row(row).get(feature) <= threshold);

        // min goes left and max goes right, so both sides are populated
        if left.is_empty() || right.is_empty() {
            return Self::Leaf { size: n_rows };
        }

        Self::Split {
            feature,
            threshold,
            left: Box::new(Self::build(x, left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build(x, right, depth + 1, max_depth, rng)),
        }
    }

    /// Features whose value differs between at least two of `rows`, sorted
    /// by feature index so that the draw only depends on the RNG.
    fn non_constant_features(x: &SparseMatrix, rows: &[usize]) -> Vec<(usize, FeatureRange)> {
        let mut ranges: BTreeMap<usize, FeatureRange> = BTreeMap::new();
        for &row in rows {
            for (feature, value) in x.row(row).iter() {
                ranges
                    .entry(feature)
                    .and_modify(|r| {
                        r.stored += 1;
                        r.min = r.min.min(value);
                        r.max = r.max.max(value);
                    })
                    .or_insert(FeatureRange {
                        stored: 1,
                        min: value,
                        max: value,
                    });
            }
        }

        ranges
            .into_iter()
            .map(|(feature, mut range)| {
                // Rows not storing the feature hold an implicit zero
                if range.stored < rows.len() {
                    range.min = range.min.min(0.0);
                    range.max = range.max.max(0.0);
                }
                (feature, range)
            })
            .filter(|(_, range)| range.max > range.min)
            .collect()
    }

    /// Isolation depth of `row`, corrected by the expected remaining depth
    /// of the leaf it lands in
    #[must_use]
    pub fn path_length(&self, row: SparseRow<'_>) -> f64 {
        let mut node = self;
        let mut depth = 0usize;
        loop {
            match node {
                Self::Leaf { size } => return depth as f64 + average_path_length(*size),
                Self::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row.get(*feature) <= *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1;
                }
            }
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf { .. } => 0,
            Self::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Split { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }
}
