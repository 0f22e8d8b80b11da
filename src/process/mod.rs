// src/process/mod.rs
pub mod cell;
pub mod extract;
pub mod normalize;
pub mod raw_table;
pub mod utils;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::Result;
use extract::{extract, latest_date_all_cells, latest_submission_with_aor};
use normalize::{normalize_all, NormalizedRecord};
use raw_table::RawTable;

/// Everything derived from one fetch of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetResponse {
    pub records: Vec<NormalizedRecord>,
    pub headers: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub latest_date_all_cells: Option<NaiveDate>,
    pub latest_submission_with_aor: Option<NaiveDate>,
}

/// Runs the whole ingestion pipeline over a gviz response body.
/// Only a missing or undecodable envelope is an error.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn load_sheet(text: &str, fetched_at: DateTime<Utc>) -> Result<SheetResponse> {
    let table = RawTable::from_response_text(text)?;
    let extracted = extract(&table);

    let response = SheetResponse {
        records: normalize_all(&extracted.records),
        latest_date_all_cells: latest_date_all_cells(&table),
        latest_submission_with_aor: latest_submission_with_aor(&table, &extracted.headers),
        headers: extracted.headers,
        fetched_at,
    };
    info!(
        rows = table.rows.len(),
        records = response.records.len(),
        latest_aor_cohort = ?response.latest_submission_with_aor,
        "sheet loaded"
    );
    Ok(response)
}
