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

use crate::anomaly::{Contamination, ForestParams, MaxSamples};
use crate::core::pipeline::DEFAULT_COLUMNS;
use crate::core::{CsvOptions, StatusLabels};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Detector settings, stored as JSON.
///
/// Every field is optional in the file; missing ones take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Text columns to one-hot encode
    pub columns: Vec<String>,
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    pub contamination: Contamination,
    pub seed: u64,
    /// Field separator, a single ASCII character
    pub delimiter: char,
    /// Status text for rows the model considers normal
    pub normal_label: String,
    /// Status text for flagged rows
    pub anomaly_label: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        let labels = StatusLabels::default();
        Self {
            columns: DEFAULT_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            n_estimators: forest.n_estimators,
            max_samples: forest.max_samples,
            contamination: forest.contamination,
            seed: forest.seed,
            delimiter: ',',
            normal_label: labels.normal,
            anomaly_label: labels.anomaly,
        }
    }
}

impl DetectorConfig {
    /// Get the path to the per-user config file
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("isocrab").join("config.json"))
    }

    /// Load the per-user config, falling back to defaults if it is absent
    /// or unreadable
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring config {}: {e:#}", path.display());
            Self::default()
        })
    }

    /// Load an explicitly requested config file, which must exist and parse
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            bail!("At least one column must be encoded");
        }
        if let Some(blank) = self.columns.iter().find(|c| c.trim().is_empty()) {
            bail!("Column names must not be blank, got '{blank}'");
        }
        self.forest_params().validate()?;
        self.csv_options()?;
        Ok(())
    }

    #[must_use]
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            contamination: self.contamination,
            seed: self.seed,
        }
    }

    pub fn csv_options(&self) -> Result<CsvOptions> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            bail!("Unsupported delimiter {:?}", self.delimiter);
        }
        Ok(CsvOptions {
            delimiter: self.delimiter as u8,
        })
    }

    #[must_use]
    pub fn labels(&self) -> StatusLabels {
        StatusLabels {
            normal: self.normal_label.clone(),
            anomaly: self.anomaly_label.clone(),
        }
    }
}
