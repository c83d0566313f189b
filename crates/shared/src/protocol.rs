use serde::{Deserialize, Serialize};

use crate::domain::{ReadingRecord, WellId};

pub fn run_route() -> &'static str {
    "/run"
}

pub fn results_route() -> &'static str {
    "/results"
}

pub fn cancel_route() -> &'static str {
    "/cancel"
}

pub fn eject_route() -> &'static str {
    "/eject"
}

/// Acknowledgement of a `/run` request; nothing has been read yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub pending: Vec<WellId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteReading {
    pub analyte: String,
    pub reading: f64,
}

/// All readings for one delivered well. An empty `data` list marks a blank well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellResults {
    pub well: WellId,
    pub data: Vec<AnalyteReading>,
}

impl WellResults {
    pub fn is_blank(&self) -> bool {
        self.data.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = ReadingRecord> + '_ {
        self.data.iter().map(|entry| ReadingRecord {
            well: self.well,
            analyte: entry.analyte.clone(),
            reading: entry.reading,
        })
    }
}

/// Body of both `/results` and `/cancel` responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub pending: Vec<WellId>,
    pub results: Vec<WellResults>,
}

impl ResultsResponse {
    pub fn delivered_wells(&self) -> Vec<WellId> {
        self.results.iter().map(|entry| entry.well).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EjectResponse {
    Failed { error: String },
    Ejected {},
}

impl EjectResponse {
    pub fn ejected() -> Self {
        Self::Ejected {}
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }
}
