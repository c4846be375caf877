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

use isocrab::core::pipeline::{ANOMALY_COLUMN, DEFAULT_COLUMNS, STATUS_COLUMN};
use isocrab::{annotate, CsvOptions, DetectionPipeline, ForestParams, LogTable, StatusLabels};
use std::path::Path;
use std::process::Command;

const PATHS: [&str; 2] = ["/var/log/nginx/access.log", "/var/log/auth.log"];
const MESSAGES: [&str; 2] = ["GET /index.html 200", "Accepted publickey for deploy"];

/// 100 ordinary rows in four groups of 25, followed by three one-off rows
fn write_logs(path: &Path) {
    let mut csv = String::from("@timestamp,host.name,log.file.path,message,event.original\n");
    for i in 0..100 {
        let file = PATHS[i % 2];
        let message = MESSAGES[(i / 2) % 2];
        csv.push_str(&format!(
            "2024-03-01T10:{:02}:{:02}Z,web-{},{file},{message},\"{message} (raw)\"\n",
            i / 60,
            i % 60,
            i % 3
        ));
    }
    for row in [
        "2024-03-01T11:00:00Z,web-9,/var/log/kern.log,Out of memory: Killed process 4242,\"oom-killer, pid 4242\"",
        "2024-03-01T11:00:01Z,web-9,/tmp/.hidden,chmod 777 /etc/shadow,chmod 777 /etc/shadow",
        "2024-03-01T11:00:02Z,web-9,/var/log/secure,Failed password for root,Failed password from 10.0.0.66",
    ] {
        csv.push_str(row);
        csv.push('\n');
    }
    std::fs::write(path, csv).expect("write input");
}

fn run_isocrab(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_isocrab"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("binary runs")
}

#[test]
fn test_library_flow_flags_one_off_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("logs.csv");
    let output = dir.path().join("annotated.csv");
    write_logs(&input);

    let csv = CsvOptions::default();
    let mut table = LogTable::read_csv(&input, &csv).expect("read");
    let (_, detection) =
        DetectionPipeline::fit_detect(&table, &DEFAULT_COLUMNS, &ForestParams::default())
            .expect("detect");

    assert_eq!(detection.anomaly_count(), 3);
    assert!(detection.verdicts[100..].iter().all(|v| v.is_anomaly()));

    annotate(&mut table, &detection, &StatusLabels::default(), false).expect("annotate");
    table.write_csv(&output, &csv).expect("write");

    let written = LogTable::read_csv(&output, &csv).expect("re-read");
    assert_eq!(written.headers().len(), 7);
    let flags: Vec<&str> = written.column(ANOMALY_COLUMN).expect("flag column").collect();
    assert_eq!(flags.iter().filter(|f| **f == "-1").count(), 3);
    assert_eq!(flags[0], "1");
    // Columns outside the model are carried through, quoted cells included
    assert_eq!(written.rows()[100][1], "web-9");
    assert_eq!(written.rows()[100][4], "oom-killer, pid 4242");
}

#[test]
fn test_rerun_on_annotated_output_replaces_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("logs.csv");
    write_logs(&input);

    let csv = CsvOptions::default();
    let mut table = LogTable::read_csv(&input, &csv).expect("read");
    for _ in 0..2 {
        let (_, detection) =
            DetectionPipeline::fit_detect(&table, &DEFAULT_COLUMNS, &ForestParams::default())
                .expect("detect");
        annotate(&mut table, &detection, &StatusLabels::default(), true).expect("annotate");
    }
    assert_eq!(table.headers().len(), 8);
    assert_eq!(table.rows()[102][6], "Anomaly detected");
}

#[test]
fn test_cli_writes_outputs_and_summary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("logs.csv");
    let output = dir.path().join("out.csv");
    let anomalies = dir.path().join("anomalies.csv");
    let config = dir.path().join("config.json");
    write_logs(&input);
    std::fs::write(&config, r#"{"anomaly_label": "Anomalie détectée"}"#).expect("write config");

    let result = run_isocrab(&[
        input.to_str().expect("utf8 path"),
        "-o",
        output.to_str().expect("utf8 path"),
        "--anomalies-output",
        anomalies.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
        "--summary-format",
        "json",
    ]);
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let summary: serde_json::Value =
        serde_json::from_slice(&result.stdout).expect("summary is json");
    assert_eq!(summary["total_logs"], 103);
    assert_eq!(summary["total_anomalies"], 3);

    let csv = CsvOptions::default();
    let written = LogTable::read_csv(&output, &csv).expect("annotated output");
    assert_eq!(written.len(), 103);
    let statuses: Vec<&str> = written.column(STATUS_COLUMN).expect("status").collect();
    assert_eq!(statuses[101], "Anomalie détectée");
    assert_eq!(statuses[0], "Normal");

    let only = LogTable::read_csv(&anomalies, &csv).expect("anomalies output");
    assert_eq!(only.len(), 3);
    assert_eq!(only.headers(), written.headers());
}

#[test]
fn test_cli_text_summary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("logs.csv");
    let output = dir.path().join("out.csv");
    let config = dir.path().join("config.json");
    write_logs(&input);
    std::fs::write(&config, "{}").expect("write config");

    let result = run_isocrab(&[
        input.to_str().expect("utf8 path"),
        "--output",
        output.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
        "--contamination",
        "0.1",
        "--with-scores",
    ]);
    assert!(result.status.success());

    let stdout = String::from_utf8(result.stdout).expect("utf8 stdout");
    assert!(stdout.starts_with("Total logs: 103\n"), "got: {stdout}");
    assert!(stdout.contains("Results exported to: "));

    let written = LogTable::read_csv(&output, &CsvOptions::default()).expect("output");
    assert_eq!(
        written.headers().last().map(String::as_str),
        Some("anomaly_score")
    );
}

#[test]
fn test_cli_reports_missing_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("logs.csv");
    let config = dir.path().join("config.json");
    std::fs::write(&input, "message\nhello\n").expect("write input");
    std::fs::write(&config, "{}").expect("write config");

    let result = run_isocrab(&[
        input.to_str().expect("utf8 path"),
        "-o",
        dir.path().join("out.csv").to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
    ]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("event.original"), "stderr: {stderr}");
}

#[test]
fn test_cli_rejects_bad_contamination() {
    let result = run_isocrab(&["logs.csv", "--contamination", "0.9"]);
    assert!(!result.status.success());
}
