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

//! End-of-run summary printed to stdout.

use crate::core::Detection;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_logs: usize,
    pub total_anomalies: usize,
    pub output_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies_file: Option<PathBuf>,
}

impl Summary {
    #[must_use]
    pub fn new(
        detection: &Detection,
        output_file: PathBuf,
        anomalies_file: Option<PathBuf>,
    ) -> Self {
        Self {
            total_logs: detection.verdicts.len(),
            total_anomalies: detection.anomaly_count(),
            output_file,
            anomalies_file,
        }
    }

    #[must_use]
    pub fn anomaly_ratio(&self) -> f64 {
        if self.total_logs == 0 {
            0.0
        } else {
            self.total_anomalies as f64 / self.total_logs as f64
        }
    }

    pub fn render(&self, format: SummaryFormat) -> Result<String> {
        Ok(match format {
            SummaryFormat::Text => self.to_string(),
            SummaryFormat::Json => serde_json::to_string_pretty(self)?,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total logs: {}", self.total_logs)?;
        writeln!(f, "Total anomalies detected: {}", self.total_anomalies)?;
        write!(f, "Results exported to: {}", self.output_file.display())?;
        if let Some(path) = &self.anomalies_file {
            write!(f, "\nAnomalies exported to: {}", path.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Verdict;

    fn detection() -> Detection {
        Detection {
            verdicts: vec![Verdict::Normal, Verdict::Anomaly, Verdict::Normal, Verdict::Normal],
            scores: vec![0.1, -0.2, 0.05, 0.0],
        }
    }

    #[test]
    fn test_text_summary() {
        let summary = Summary::new(&detection(), PathBuf::from("out.csv"), None);
        assert_eq!(
            summary.render(SummaryFormat::Text).expect("render"),
            "Total logs: 4\nTotal anomalies detected: 1\nResults exported to: out.csv"
        );
        assert!((summary.anomaly_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_text_summary_with_anomalies_file() {
        let summary = Summary::new(
            &detection(),
            PathBuf::from("out.csv"),
            Some(PathBuf::from("only.csv")),
        );
        assert!(summary
            .to_string()
            .ends_with("\nAnomalies exported to: only.csv"));
    }

    #[test]
    fn test_json_summary() {
        let summary = Summary::new(&detection(), PathBuf::from("out.csv"), None);
        let json: serde_json::Value =
            serde_json::from_str(&summary.render(SummaryFormat::Json).expect("render"))
                .expect("valid json");
        assert_eq!(json["total_logs"], 4);
        assert_eq!(json["total_anomalies"], 1);
        assert_eq!(json["output_file"], "out.csv");
        assert!(json.get("anomalies_file").is_none());
    }
}
