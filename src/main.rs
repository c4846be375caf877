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

use anyhow::{Context, Result};
use clap::Parser;
use isocrab::{
    annotate, Contamination, DetectionPipeline, DetectorConfig, LogTable, MaxSamples, Summary,
    SummaryFormat,
};
use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(name = "isocrab")]
#[command(author = "isocrab contributors")]
#[command(version = VERSION)]
#[command(
    about = "Flag unusual rows of a CSV log export with an Isolation Forest",
    long_about = None
)]
struct Args {
    /// CSV file to analyze, first line must be the header
    #[arg(value_name = "INPUT", default_value = "logs.csv")]
    input: PathBuf,

    /// Where to write the annotated CSV
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "logs2_with_anomalies.csv"
    )]
    output: PathBuf,

    /// Also write only the anomalous rows to this file
    #[arg(long, value_name = "FILE")]
    anomalies_output: Option<PathBuf>,

    /// Comma separated text columns to one-hot encode
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Expected share of anomalies in (0, 0.5], or "auto"
    #[arg(long, value_name = "RATIO")]
    contamination: Option<Contamination>,

    /// Number of trees in the forest
    #[arg(long, value_name = "N")]
    n_estimators: Option<usize>,

    /// Rows drawn per tree: "auto", a count or a fraction
    #[arg(long, value_name = "SAMPLES")]
    max_samples: Option<MaxSamples>,

    /// Random seed, runs with the same seed give the same result
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Field separator of input and output
    #[arg(long, value_name = "CHAR")]
    delimiter: Option<char>,

    /// Status text for normal rows
    #[arg(long, value_name = "TEXT")]
    normal_label: Option<String>,

    /// Status text for anomalous rows
    #[arg(long, value_name = "TEXT")]
    anomaly_label: Option<String>,

    /// Add an anomaly_score column (negative = anomalous)
    #[arg(long)]
    with_scores: bool,

    /// How to print the summary on stdout
    #[arg(long, value_enum, default_value_t)]
    summary_format: SummaryFormat,

    /// JSON config file (defaults to the per-user config if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to this file
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,
}

impl Args {
    /// Command line flags take precedence over the config file
    fn apply_to(&self, config: &mut DetectorConfig) {
        if let Some(columns) = &self.columns {
            config.columns.clone_from(columns);
        }
        if let Some(contamination) = self.contamination {
            config.contamination = contamination;
        }
        if let Some(n_estimators) = self.n_estimators {
            config.n_estimators = n_estimators;
        }
        if let Some(max_samples) = self.max_samples {
            config.max_samples = max_samples;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(label) = &self.normal_label {
            config.normal_label.clone_from(label);
        }
        if let Some(label) = &self.anomaly_label {
            config.anomaly_label.clone_from(label);
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries the summary
    // Set RUST_LOG to override (e.g. RUST_LOG=isocrab=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "isocrab=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!("isocrab starting up (version {VERSION})");
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let mut config = args.config.as_deref().map_or_else(
        || Ok(DetectorConfig::load()),
        DetectorConfig::load_from,
    )?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    if let Some(path) = &args.save_config {
        config.save(path)?;
    }

    tracing::info!(
        "Encoding columns [{}], {} trees, max_samples {}, contamination {}, seed {}",
        config.columns.join(", "),
        config.n_estimators,
        config.max_samples,
        config.contamination,
        config.seed
    );

    let csv = config.csv_options()?;
    let mut table = LogTable::read_csv(&args.input, &csv)?;

    let (_, detection) =
        DetectionPipeline::fit_detect(&table, &config.columns, &config.forest_params())
            .with_context(|| format!("Anomaly detection failed on {}", args.input.display()))?;

    annotate(&mut table, &detection, &config.labels(), args.with_scores)?;
    table.write_csv(&args.output, &csv)?;

    if let Some(path) = &args.anomalies_output {
        let anomalies = table.filter_rows(|idx| detection.verdicts[idx].is_anomaly());
        anomalies.write_csv(path, &csv)?;
    }

    let summary = Summary::new(
        &detection,
        args.output.clone(),
        args.anomalies_output.clone(),
    );
    tracing::info!(
        "{:.2}% of rows flagged",
        summary.anomaly_ratio() * 100.0
    );
    println!("{}", summary.render(args.summary_format)?);

    Ok(())
}
