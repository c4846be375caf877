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

//! In-memory CSV table of log records.
//!
//! Cells are kept as the raw text found in the file so that columns the
//! model never looks at are written back byte-for-byte.

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Dialect settings shared by the reader and the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Header plus rows, every row exactly as wide as the header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl LogTable {
    /// Build a table from already split cells. Rows are padded or rejected
    /// with the same rules as [`LogTable::read_csv`].
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut table = Self {
            headers,
            rows: Vec::with_capacity(rows.len()),
        };
        for (idx, row) in rows.into_iter().enumerate() {
            table.push_row(row, idx + 2)?;
        }
        Ok(table)
    }

    /// Load a CSV file whose first line is the header
    pub fn read_csv(path: &Path, options: &CsvOptions) -> Result<Self> {
        let start = std::time::Instant::now();
        let file =
            File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
        let table = Self::from_reader(file, options)
            .with_context(|| format!("Cannot parse {}", path.display()))?;
        tracing::info!(
            "Loaded {} rows x {} columns from {} in {:?}",
            table.len(),
            table.headers.len(),
            path.display(),
            start.elapsed()
        );
        Ok(table)
    }

    /// Parse CSV content from any reader. Invalid UTF-8 is replaced rather
    /// than rejected, log exports are rarely clean.
    pub fn from_reader<R: Read>(reader: R, options: &CsvOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .byte_headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();

        if headers.is_empty() {
            bail!("Input has no header line");
        }

        let mut table = Self {
            headers,
            rows: Vec::new(),
        };

        for result in reader.byte_records() {
            let record = result.context("Failed to read CSV record")?;
            let line = record
                .position()
                .map_or(table.rows.len() + 2, |pos| pos.line() as usize);
            let row = record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect();
            table.push_row(row, line)?;
        }

        Ok(table)
    }

    fn push_row(&mut self, mut row: Vec<String>, line: usize) -> Result<()> {
        let width = self.headers.len();
        if row.len() > width {
            bail!(
                "Line {line} has {} fields but the header only has {width}",
                row.len()
            );
        }
        if row.len() < width {
            tracing::warn!(
                "Line {line} has {} of {width} fields, treating the rest as empty",
                row.len()
            );
            row.resize(width, String::new());
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Iterate over the cells of one column
    pub fn column<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a str> + 'a> {
        let idx = self
            .column_index(name)
            .with_context(|| format!("Column '{name}' not found"))?;
        Ok(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Resolve every requested column, reporting all missing ones at once
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let resolved: Vec<Option<usize>> = names
            .iter()
            .map(|name| self.column_index(name.as_ref()))
            .collect();
        let missing: Vec<&str> = names
            .iter()
            .zip(&resolved)
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.as_ref())
            .collect();
        if !missing.is_empty() {
            bail!(
                "Missing required column(s): {} (available: {})",
                missing.join(", "),
                self.headers.join(", ")
            );
        }
        Ok(resolved.into_iter().flatten().collect())
    }

    /// Overwrite a column in place, or append it if the table lacks it
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            bail!(
                "Column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            );
        }
        let idx = self.column_index(name).unwrap_or_else(|| {
            self.headers.push(name.to_string());
            for row in &mut self.rows {
                row.push(String::new());
            }
            self.headers.len() - 1
        });
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    /// Copy of the table keeping only the rows whose index passes `keep`
    #[must_use]
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        Self {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .enumerate()
                .filter(|(idx, _)| keep(*idx))
                .map(|(_, row)| row.clone())
                .collect(),
        }
    }

    /// Write header and rows, without any index column
    pub fn write_csv(&self, path: &Path, options: &CsvOptions) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Cannot create {}", path.display()))?;
        self.to_writer(file, options)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        tracing::info!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W, options: &CsvOptions) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
