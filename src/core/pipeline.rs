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

//! Encoder and forest chained together.
//!
//! Only the configured text columns reach the model; every other column is
//! left out of the feature matrix and carried through to the output as is.

use crate::anomaly::isolation_forest::verdict_for;
use crate::anomaly::{ForestParams, IsolationForest, Verdict};
use crate::core::LogTable;
use crate::encoding::OneHotEncoder;
use anyhow::Result;

/// Flag column, `1` normal / `-1` anomaly
pub const ANOMALY_COLUMN: &str = "anomaly";
/// Human readable status column
pub const STATUS_COLUMN: &str = "anomaly_message";
/// Decision function column, only written on request
pub const SCORE_COLUMN: &str = "anomaly_score";

/// Text columns encoded when none are configured
pub const DEFAULT_COLUMNS: [&str; 3] = ["log.file.path", "message", "event.original"];

/// Strings written to the status column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabels {
    pub normal: String,
    pub anomaly: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            normal: "Normal".to_string(),
            anomaly: "Anomaly detected".to_string(),
        }
    }
}

impl StatusLabels {
    #[must_use]
    pub fn label(&self, verdict: Verdict) -> &str {
        match verdict {
            Verdict::Normal => &self.normal,
            Verdict::Anomaly => &self.anomaly,
        }
    }
}

/// Fitted one-hot encoder feeding a fitted isolation forest
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    encoder: OneHotEncoder,
    forest: IsolationForest,
}

/// Outcome of running the pipeline over a table
#[derive(Debug, Clone)]
pub struct Detection {
    pub verdicts: Vec<Verdict>,
    /// Decision function per row, negative for outliers
    pub scores: Vec<f64>,
}

impl Detection {
    #[must_use]
    pub fn anomaly_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_anomaly()).count()
    }
}

impl DetectionPipeline {
    pub fn fit<S: AsRef<str>>(
        table: &LogTable,
        columns: &[S],
        params: &ForestParams,
    ) -> Result<Self> {
        let (encoder, features) = OneHotEncoder::fit_transform(table, columns)?;
        tracing::info!(
            "Encoded {} rows into {} features ({} stored values)",
            features.n_rows(),
            features.n_cols(),
            features.nnz()
        );
        let forest = IsolationForest::fit(&features, params)?;
        Ok(Self { encoder, forest })
    }

    pub fn predict(&self, table: &LogTable) -> Result<Vec<Verdict>> {
        let features = self.encoder.transform(table)?;
        self.forest.predict(&features)
    }

    pub fn decision_function(&self, table: &LogTable) -> Result<Vec<f64>> {
        let features = self.encoder.transform(table)?;
        self.forest.decision_function(&features)
    }

    /// Verdicts and decision scores in one pass over the encoded table
    pub fn detect(&self, table: &LogTable) -> Result<Detection> {
        let features = self.encoder.transform(table)?;
        let scores = self.forest.decision_function(&features)?;
        let verdicts = scores
            .iter()
            .copied()
            .map(verdict_for)
            .collect();
        Ok(Detection { verdicts, scores })
    }

    /// Fit on `table` and label the same rows
    pub fn fit_detect<S: AsRef<str>>(
        table: &LogTable,
        columns: &[S],
        params: &ForestParams,
    ) -> Result<(Self, Detection)> {
        let pipeline = Self::fit(table, columns, params)?;
        let detection = pipeline.detect(table)?;
        tracing::info!(
            "{} of {} rows flagged as anomalous",
            detection.anomaly_count(),
            detection.verdicts.len()
        );
        Ok((pipeline, detection))
    }

    #[cfg(test)]
    pub const fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

/// Add the flag and status columns (and the score column when `with_scores`)
pub fn annotate(
    table: &mut LogTable,
    detection: &Detection,
    labels: &StatusLabels,
    with_scores: bool,
) -> Result<()> {
    let flags = detection
        .verdicts
        .iter()
        .map(|v| v.flag().to_string())
        .collect();
    table.set_column(ANOMALY_COLUMN, flags)?;

    let messages = detection
        .verdicts
        .iter()
        .map(|&v| labels.label(v).to_string())
        .collect();
    table.set_column(STATUS_COLUMN, messages)?;

    if with_scores {
        let scores = detection
            .scores
            .iter()
            .map(|s| format!("{s:.6}"))
            .collect();
        table.set_column(SCORE_COLUMN, scores)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CsvOptions;

    fn log_table() -> LogTable {
        let mut csv = String::from("@timestamp,log.file.path,message,event.original\n");
        for i in 0..60 {
            let path = if i % 2 == 0 { "/var/log/syslog" } else { "/var/log/auth.log" };
            let message = if i % 3 == 0 { "session opened" } else { "session closed" };
            csv.push_str(&format!(
                "2024-05-0{} 10:00:{i:02},{path},{message},{message}\n",
                i % 9 + 1
            ));
        }
        csv.push_str("2024-05-09 23:59:59,/tmp/x,kernel panic,kernel panic - not syncing\n");
        LogTable::from_reader(csv.as_bytes(), &CsvOptions::default()).expect("valid csv")
    }

    #[test]
    fn test_fit_detect_flags_the_odd_row() {
        let table = log_table();
        let (_, detection) =
            DetectionPipeline::fit_detect(&table, &DEFAULT_COLUMNS, &ForestParams::default())
                .expect("pipeline runs");

        assert_eq!(detection.verdicts.len(), 61);
        assert!(detection.verdicts[60].is_anomaly());
        assert!(detection.scores[60] < 0.0);
        let min_normal = detection.scores[..60]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        assert!(detection.scores[60] < min_normal);
    }

    #[test]
    fn test_predict_matches_detect() {
        let table = log_table();
        let pipeline = DetectionPipeline::fit(&table, &DEFAULT_COLUMNS, &ForestParams::default())
            .expect("fit");
        let detection = pipeline.detect(&table).expect("detect");
        assert_eq!(pipeline.predict(&table).expect("predict"), detection.verdicts);
        assert_eq!(
            pipeline.decision_function(&table).expect("scores"),
            detection.scores
        );
        assert_eq!(pipeline.encoder().n_features(), 3 + 3 + 3);
    }

    #[test]
    fn test_annotate_adds_columns() {
        let mut table = log_table();
        let (_, detection) =
            DetectionPipeline::fit_detect(&table, &DEFAULT_COLUMNS, &ForestParams::default())
                .expect("pipeline runs");
        annotate(&mut table, &detection, &StatusLabels::default(), true).expect("annotate");

        let headers = table.headers();
        assert_eq!(&headers[4..], [ANOMALY_COLUMN, STATUS_COLUMN, SCORE_COLUMN]);
        let last = &table.rows()[60];
        assert_eq!(last[4], "-1");
        assert_eq!(last[5], "Anomaly detected");
        assert_eq!(table.rows()[0][5], "Normal");
    }

    #[test]
    fn test_missing_column_is_reported() {
        let table = LogTable::from_reader("message\nhello\n".as_bytes(), &CsvOptions::default())
            .expect("valid csv");
        let err = DetectionPipeline::fit(&table, &DEFAULT_COLUMNS, &ForestParams::default())
            .expect_err("columns missing");
        assert!(err.to_string().contains("log.file.path"), "got: {err}");
    }
}
