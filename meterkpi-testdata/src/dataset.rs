// MeterKPI Testdata - Dataset structures
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Dataset structures and I/O operations.
//!
//! A [`Dataset`] holds raw, text-valued rows exactly as a readings sheet
//! export would. CSV files use the sheet headers; header matching on import
//! is case-insensitive and unknown columns are ignored.

use meterkpi::{RawColumn, RawReading};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Dataset error types.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),
}

/// Dataset metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Scenario name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Generation seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sample interval in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    /// Days covered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

/// Raw meter readings for one or more locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Rows in generation order.
    pub rows: Vec<RawReading>,
    /// Metadata.
    #[serde(default)]
    pub metadata: DatasetMetadata,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set metadata.
    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a row.
    pub fn add_row(&mut self, row: RawReading) {
        self.rows.push(row);
    }

    /// Get all rows.
    pub fn rows(&self) -> &[RawReading] {
        &self.rows
    }

    /// Take the rows.
    pub fn into_rows(self) -> Vec<RawReading> {
        self.rows
    }

    /// Get number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct location names, sorted.
    pub fn locations(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.location.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rows of one location.
    pub fn for_location(&self, location: &str) -> Vec<RawReading> {
        self.rows
            .iter()
            .filter(|r| r.location.as_deref() == Some(location))
            .cloned()
            .collect()
    }

    /// Export to CSV file.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))
    }

    /// Write CSV with the sheet headers. Absent cells are left empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(RawColumn::ALL.iter().map(RawColumn::header))?;
        for row in &self.rows {
            writer.write_record(RawColumn::ALL.iter().map(|c| row.cell(*c).unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Import from CSV file.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        Self::read_csv(BufReader::new(file))
    }

    /// Read CSV rows.
    ///
    /// Headers are matched case-insensitively against the sheet names. A file
    /// without a timestamp column is rejected; every other column is optional.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<Option<RawColumn>> = reader
            .headers()?
            .iter()
            .map(RawColumn::from_header)
            .collect();
        if !columns.contains(&Some(RawColumn::Timestamp)) {
            return Err(DatasetError::MissingColumn(
                RawColumn::Timestamp.header().to_string(),
            ));
        }

        let mut dataset = Dataset::new();
        for record in reader.records() {
            let record = record?;
            let mut row = RawReading::default();
            for (column, value) in columns.iter().zip(record.iter()) {
                if let Some(column) = column {
                    if !value.is_empty() {
                        *row.cell_mut(*column) = Some(value.to_string());
                    }
                }
            }
            dataset.add_row(row);
        }
        Ok(dataset)
    }

    /// Export to JSON file.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Import from JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let dataset = serde_json::from_reader(reader)?;
        Ok(dataset)
    }
}
