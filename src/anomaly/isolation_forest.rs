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

//! Isolation Forest (Liu, Ting & Zhou, 2008).
//!
//! Scores follow the usual convention: `score_samples` is the negated
//! anomaly score in `[-1, 0)`, lower meaning more abnormal, and
//! `decision_function` shifts it by the fitted offset so that negative
//! values are outliers.

use crate::anomaly::{
    average_path_length, Contamination, ForestParams, IsolationTree, Verdict, AUTO_OFFSET,
};
use crate::encoding::SparseMatrix;
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Rows drawn per tree
    max_samples: usize,
    n_features: usize,
    offset: f64,
}

impl IsolationForest {
    /// Grow the forest on `x` and derive the decision offset from `params.contamination`
    pub fn fit(x: &SparseMatrix, params: &ForestParams) -> Result<Self> {
        params.validate()?;
        let n_rows = x.n_rows();
        if n_rows == 0 {
            bail!("Cannot fit an isolation forest on zero rows");
        }

        let start = std::time::Instant::now();
        let max_samples = params.max_samples.resolve(n_rows);
        let max_depth = (max_samples.max(2) as f64).log2().ceil() as usize;

        // Seeds are drawn up front so the forest does not depend on how
        // rayon schedules the trees
        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

        let trees: Vec<IsolationTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let rows = rand::seq::index::sample(&mut rng, n_rows, max_samples).into_vec();
                IsolationTree::build(x, rows, 0, max_depth, &mut rng)
            })
            .collect();

        let n_trees = trees.len().max(1) as f64;
        tracing::debug!(
            "Grew {} trees on {max_samples} of {n_rows} rows (depth limit {max_depth}, {} features), \
             mean depth {:.2}, mean leaves {:.1}",
            trees.len(),
            x.n_cols(),
            trees.iter().map(IsolationTree::depth).sum::<usize>() as f64 / n_trees,
            trees.iter().map(IsolationTree::leaf_count).sum::<usize>() as f64 / n_trees
        );

        let mut forest = Self {
            trees,
            max_samples,
            n_features: x.n_cols(),
            offset: AUTO_OFFSET,
        };

        if let Contamination::Ratio(ratio) = params.contamination {
            let scores = forest.score_samples(x)?;
            forest.offset = percentile(&scores, ratio * 100.0);
        }

        tracing::info!(
            "Isolation forest fitted in {:?} (offset {:.6})",
            start.elapsed(),
            forest.offset
        );

        Ok(forest)
    }

    /// Negated anomaly score per row, in `[-1, 0)`; lower is more abnormal
    pub fn score_samples(&self, x: &SparseMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.n_features {
            bail!(
                "Input has {} features but the forest was fitted on {}",
                x.n_cols(),
                self.n_features
            );
        }

        let normalizer = average_path_length(self.max_samples);
        let n_trees = self.trees.len() as f64;

        let scores = (0..x.n_rows())
            .into_par_iter()
            .map(|idx| {
                if normalizer == 0.0 {
                    // Single-row subsamples carry no isolation information
                    return AUTO_OFFSET;
                }
                let row = x.row(idx);
                let mean_depth =
                    self.trees.iter().map(|tree| tree.path_length(row)).sum::<f64>() / n_trees;
                -(2.0_f64.powf(-mean_depth / normalizer))
            })
            .collect();

        Ok(scores)
    }

    /// `score_samples` shifted by the offset: negative means outlier
    pub fn decision_function(&self, x: &SparseMatrix) -> Result<Vec<f64>> {
        Ok(self
            .score_samples(x)?
            .into_iter()
            .map(|score| score - self.offset)
            .collect())
    }

    pub fn predict(&self, x: &SparseMatrix) -> Result<Vec<Verdict>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(verdict_for)
            .collect())
    }

    pub fn fit_predict(x: &SparseMatrix, params: &ForestParams) -> Result<(Self, Vec<Verdict>)> {
        let forest = Self::fit(x, params)?;
        let verdicts = forest.predict(x)?;
        Ok((forest, verdicts))
    }

    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub const fn max_samples(&self) -> usize {
        self.max_samples
    }

    #[cfg(test)]
    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }
}

/// Outlier iff the decision value is strictly negative
#[must_use]
pub fn verdict_for(decision: f64) -> Verdict {
    if decision < 0.0 {
        Verdict::Anomaly
    } else {
        Verdict::Normal
    }
}

/// `q`-th percentile (0..=100) with linear interpolation between closest ranks
#[must_use]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
