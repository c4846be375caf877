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

//! Outlier detection for tabular log exports.
//!
//! The flow is read CSV, one-hot encode a few text columns, fit an
//! Isolation Forest on the encoded rows, then write the table back with an
//! `anomaly` flag and an `anomaly_message` status per row.

pub mod anomaly;
pub mod config;
pub mod core;
pub mod encoding;
pub mod report;

pub use crate::anomaly::{Contamination, ForestParams, IsolationForest, MaxSamples, Verdict};
pub use crate::config::DetectorConfig;
pub use crate::core::{annotate, CsvOptions, Detection, DetectionPipeline, LogTable, StatusLabels};
pub use crate::encoding::{OneHotEncoder, SparseMatrix};
pub use crate::report::{Summary, SummaryFormat};
