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

//! Isolation Forest outlier detection.

pub mod isolation_forest;
pub mod isolation_tree;

pub use isolation_forest::IsolationForest;
pub use isolation_tree::IsolationTree;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Euler–Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Offset used when the contamination is `auto`
pub const AUTO_OFFSET: f64 = -0.5;

/// Average path length of an unsuccessful BST search among `n` points,
/// used to normalize isolation depths.
#[must_use]
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Per-row outcome of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Normal,
    Anomaly,
}

impl Verdict {
    /// Binary flag written to the output: 1 normal, -1 anomaly
    #[must_use]
    pub const fn flag(self) -> i8 {
        match self {
            Self::Normal => 1,
            Self::Anomaly => -1,
        }
    }

    #[must_use]
    pub const fn is_anomaly(self) -> bool {
        matches!(self, Self::Anomaly)
    }
}

/// Expected share of outliers, which decides the score threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParamRepr", into = "ParamRepr")]
pub enum Contamination {
    /// Fixed offset of -0.5 on the raw score, as in the original paper
    Auto,
    /// Fraction in (0, 0.5] of the training rows to flag
    Ratio(f64),
}

impl Default for Contamination {
    fn default() -> Self {
        Self::Ratio(0.05)
    }
}

impl Contamination {
    pub fn validate(self) -> Result<Self> {
        if let Self::Ratio(ratio) = self {
            if !(ratio > 0.0 && ratio <= 0.5) {
                bail!("Contamination must be in (0, 0.5], got {ratio}");
            }
        }
        Ok(self)
    }
}

impl FromStr for Contamination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let ratio: f64 = s
            .parse()
            .with_context(|| format!("Invalid contamination '{s}', expected 'auto' or a ratio"))?;
        Self::Ratio(ratio).validate()
    }
}

impl fmt::Display for Contamination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Ratio(ratio) => write!(f, "{ratio}"),
        }
    }
}

/// Number of rows drawn for each tree
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ParamRepr", into = "ParamRepr")]
pub enum MaxSamples {
    /// `min(256, n)`
    #[default]
    Auto,
    /// Absolute count, capped at the number of rows
    Count(usize),
    /// Fraction in (0, 1] of the rows
    Fraction(f64),
}

/// Default subsample size for `MaxSamples::Auto`
pub const AUTO_MAX_SAMPLES: usize = 256;

impl MaxSamples {
    pub fn validate(self) -> Result<Self> {
        match self {
            Self::Auto => {}
            Self::Count(0) => bail!("max_samples must be at least 1"),
            Self::Count(_) => {}
            Self::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    bail!("max_samples fraction must be in (0, 1], got {f}");
                }
            }
        }
        Ok(self)
    }

    /// Subsample size for a dataset of `n_rows` rows (`n_rows > 0`)
    #[must_use]
    pub fn resolve(self, n_rows: usize) -> usize {
        let psi = match self {
            Self::Auto => AUTO_MAX_SAMPLES.min(n_rows),
            Self::Count(count) => {
                if count > n_rows {
                    tracing::warn!(
                        "max_samples ({count}) is greater than the number of rows ({n_rows}), using all rows"
                    );
                }
                count.min(n_rows)
            }
            Self::Fraction(f) => (f * n_rows as f64) as usize,
        };
        psi.max(1)
    }
}

impl FromStr for MaxSamples {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        if let Ok(count) = s.parse::<usize>() {
            return Self::Count(count).validate();
        }
        let fraction: f64 = s.parse().with_context(|| {
            format!("Invalid max_samples '{s}', expected 'auto', a count or a fraction")
        })?;
        Self::Fraction(fraction).validate()
    }
}

impl fmt::Display for MaxSamples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Count(count) => write!(f, "{count}"),
            Self::Fraction(fraction) => write!(f, "{fraction}"),
        }
    }
}

/// Config-file shape shared by [`Contamination`] and [`MaxSamples`]:
/// `"auto"`, an integer or a float.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamRepr {
    Int(usize),
    Float(f64),
    Keyword(String),
}

impl TryFrom<ParamRepr> for Contamination {
    type Error = anyhow::Error;

    fn try_from(repr: ParamRepr) -> Result<Self> {
        match repr {
            ParamRepr::Int(n) => Self::Ratio(n as f64).validate(),
            ParamRepr::Float(ratio) => Self::Ratio(ratio).validate(),
            ParamRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<Contamination> for ParamRepr {
    fn from(value: Contamination) -> Self {
        match value {
            Contamination::Auto => Self::Keyword("auto".to_string()),
            Contamination::Ratio(ratio) => Self::Float(ratio),
        }
    }
}

impl TryFrom<ParamRepr> for MaxSamples {
    type Error = anyhow::Error;

    fn try_from(repr: ParamRepr) -> Result<Self> {
        match repr {
            ParamRepr::Int(count) => Self::Count(count).validate(),
            ParamRepr::Float(fraction) => Self::Fraction(fraction).validate(),
            ParamRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<MaxSamples> for ParamRepr {
    fn from(value: MaxSamples) -> Self {
        match value {
            MaxSamples::Auto => Self::Keyword("auto".to_string()),
            MaxSamples::Count(count) => Self::Int(count),
            MaxSamples::Fraction(fraction) => Self::Float(fraction),
        }
    }
}

/// Hyperparameters of the forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    pub contamination: Contamination,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: MaxSamples::Auto,
            contamination: Contamination::default(),
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            bail!("n_estimators must be at least 1");
        }
        self.max_samples.validate()?;
        self.contamination.validate()?;
        Ok(())
    }
}
