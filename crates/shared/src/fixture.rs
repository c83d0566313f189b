//! Sample results fixture used by the read simulator.
//!
//! The instrument export starts with a block of metadata rows, then one header
//! row, then `well,analyte,reading` data rows.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::{
    domain::{unique_sorted_wells, ReadingRecord, WellId, WellIdError},
    protocol::{AnalyteReading, WellResults},
};

/// Index of the header row; every row before it is metadata.
pub const DATA_START_ROW: usize = 13;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read csv row {row}: {source}")]
    Csv { row: usize, source: csv::Error },
    #[error("row {row} has {found} fields, expected at least 3")]
    ShortRow { row: usize, found: usize },
    #[error("row {row}: {source}")]
    Well { row: usize, source: WellIdError },
    #[error("row {row}: reading '{raw}' is not a number")]
    Reading { row: usize, raw: String },
}

/// Parses the exported CSV text into reading records.
pub fn parse_results(text: &str) -> Result<Vec<ReadingRecord>, FixtureError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|source| FixtureError::Csv { row, source })?;
        if row <= DATA_START_ROW {
            continue;
        }
        if record.len() < 3 {
            return Err(FixtureError::ShortRow {
                row,
                found: record.len(),
            });
        }

        let well = record[0]
            .parse::<WellId>()
            .map_err(|source| FixtureError::Well { row, source })?;
        let raw_reading = record[2].trim();
        let reading = raw_reading
            .parse::<f64>()
            .map_err(|_| FixtureError::Reading {
                row,
                raw: raw_reading.to_string(),
            })?;

        records.push(ReadingRecord {
            well,
            analyte: record[1].trim().to_string(),
            reading,
        });
    }

    Ok(records)
}

/// Count and median of the readings for one well/analyte pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSummary {
    pub well: WellId,
    pub analyte: String,
    pub count: usize,
    pub median: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ResultsFixture {
    records: Vec<ReadingRecord>,
}

impl ResultsFixture {
    pub fn new(records: Vec<ReadingRecord>) -> Self {
        Self { records }
    }

    pub fn parse(text: &str) -> Result<Self, FixtureError> {
        parse_results(text).map(Self::new)
    }

    pub fn records(&self) -> &[ReadingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every fixture reading for `well`; empty when the well is blank.
    pub fn well_results(&self, well: WellId) -> WellResults {
        let data = self
            .records
            .iter()
            .filter(|record| record.well == well)
            .map(|record| AnalyteReading {
                analyte: record.analyte.clone(),
                reading: record.reading,
            })
            .collect();
        WellResults { well, data }
    }

    pub fn group_by_well(&self, wells: &[WellId]) -> Vec<WellResults> {
        wells.iter().map(|well| self.well_results(*well)).collect()
    }

    pub fn wells(&self) -> Vec<WellId> {
        unique_sorted_wells(self.records.iter().map(|record| &record.well))
    }

    pub fn analytes(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.analyte.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn medians(&self) -> Vec<ReadingSummary> {
        let mut grouped: BTreeMap<(WellId, &str), Vec<f64>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry((record.well, record.analyte.as_str()))
                .or_default()
                .push(record.reading);
        }

        grouped
            .into_iter()
            .map(|((well, analyte), mut readings)| {
                readings.sort_by(f64::total_cmp);
                ReadingSummary {
                    well,
                    analyte: analyte.to_string(),
                    count: readings.len(),
                    median: median_of_sorted(&readings),
                }
            })
            .collect()
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.is_empty() {
        f64::NAN
    } else if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
