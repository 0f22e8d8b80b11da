use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::process::cell::{is_filled, parse_date, CellValue};
use crate::process::raw_table::RawTable;
use crate::process::utils::{ingest_date, normalize_header};

/// Substrings that mark a row as the header row.
const HEADER_NEEDLES: &[&str] = &["name", "province", "pnp", "stream"];

/// Section markers carry a date and little else.
const MARKER_MAX_FILLED: usize = 3;
const MIN_FILLED_CELLS: usize = 2;

/// Used when no header mentions AOR.
const DEFAULT_AOR_COLUMN: usize = 4;

static DMY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}-[A-Za-z]{3}-\d{4}$").expect("d-mon-y regex"));

/// A data row keyed by normalised header, plus the cohort date it sits under.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<CellValue>>,
    #[serde(rename = "__submissionDate")]
    pub submission_date: Option<NaiveDate>,
    #[serde(rename = "__source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ParsedRecord {
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.fields.get(key).and_then(Option::as_ref)
    }

    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.fields.values().flatten()
    }

    fn filled_fields(&self) -> usize {
        self.fields.values().filter(|v| is_filled(v)).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub headers: Vec<String>,
    pub records: Vec<ParsedRecord>,
}

fn filled_count(row: &[Option<CellValue>]) -> usize {
    row.iter().filter(|c| is_filled(c)).count()
}

pub fn find_header_row(rows: &[Vec<Option<CellValue>>]) -> Option<usize> {
    rows.iter().position(|row| {
        row.iter().flatten().filter_map(CellValue::as_text).any(|s| {
            let lowered = s.to_lowercase();
            HEADER_NEEDLES.iter().any(|n| lowered.contains(n))
        })
    })
}

/// The cohort date announced by a row, if the row is a section marker.
pub fn section_marker_date(row: &[Option<CellValue>]) -> Option<NaiveDate> {
    let date = ingest_date(row.get(1).and_then(Option::as_ref))
        .or_else(|| ingest_date(row.first().and_then(Option::as_ref)))?;
    (filled_count(row) <= MARKER_MAX_FILLED).then_some(date)
}

pub fn looks_like_date(s: &str) -> bool {
    parse_date(s).is_some() || DMY_DATE.is_match(s)
}

fn is_data_row(record: &ParsedRecord) -> bool {
    let name = match record.get("name") {
        Some(v) if !v.is_blank() => v.to_string(),
        _ => return false,
    };
    if looks_like_date(&name) || name.eq_ignore_ascii_case("total") {
        return false;
    }
    record.filled_fields() >= MIN_FILLED_CELLS
}

#[derive(Default)]
struct RecordScan {
    submission_date: Option<NaiveDate>,
    records: Vec<ParsedRecord>,
}

/// Locates the header row, keys every following row by it, and folds the
/// section-marker date forward onto the data rows beneath it.
pub fn extract(table: &RawTable) -> Extracted {
    let header_index = find_header_row(&table.rows).unwrap_or(0);
    let headers: Vec<String> = table
        .rows
        .get(header_index)
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| normalize_header(cell.as_ref(), i))
                .collect()
        })
        .unwrap_or_default();
    debug!(header_index, columns = headers.len(), "detected header row");

    let scan = table
        .rows
        .iter()
        .skip(header_index + 1)
        .fold(RecordScan::default(), |mut scan, row| {
            if let Some(date) = section_marker_date(row) {
                trace!(%date, "section marker");
                scan.submission_date = Some(date);
                return scan;
            }
            if filled_count(row) < MIN_FILLED_CELLS {
                return scan;
            }
            let record = ParsedRecord {
                fields: headers
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (key.clone(), row.get(i).cloned().flatten()))
                    .collect(),
                submission_date: scan.submission_date,
                source: None,
            };
            if is_data_row(&record) {
                scan.records.push(record);
            }
            scan
        });

    debug!(records = scan.records.len(), "extracted data rows");
    Extracted {
        headers,
        records: scan.records,
    }
}

/// Latest in-range ISO date found in any cell of the sheet.
pub fn latest_date_all_cells(table: &RawTable) -> Option<NaiveDate> {
    table
        .cells()
        .filter_map(|cell| ingest_date(cell.as_ref()))
        .max()
}

pub fn aor_columns(headers: &[String]) -> Vec<usize> {
    let cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains("aor"))
        .map(|(i, _)| i)
        .collect();
    if cols.is_empty() {
        vec![DEFAULT_AOR_COLUMN]
    } else {
        cols
    }
}

#[derive(Default)]
struct AorScan {
    submission_date: Option<NaiveDate>,
    max_aor_by_submission: BTreeMap<NaiveDate, NaiveDate>,
    global_max: Option<NaiveDate>,
}

/// The latest cohort date whose rows reached the sheet-wide latest AOR date.
/// Scans every row, including those above the header.
pub fn latest_submission_with_aor(table: &RawTable, headers: &[String]) -> Option<NaiveDate> {
    let columns = aor_columns(headers);
    let scan = table.rows.iter().fold(AorScan::default(), |mut scan, row| {
        if let Some(date) = section_marker_date(row) {
            scan.submission_date = Some(date);
            return scan;
        }
        let Some(submission) = scan.submission_date else {
            return scan;
        };
        let row_max = columns
            .iter()
            .filter_map(|&i| ingest_date(row.get(i).and_then(Option::as_ref)))
            .max();
        if let Some(aor) = row_max {
            let entry = scan.max_aor_by_submission.entry(submission).or_insert(aor);
            *entry = (*entry).max(aor);
            scan.global_max = scan.global_max.max(Some(aor));
        }
        scan
    });

    let global_max = scan.global_max?;
    scan.max_aor_by_submission
        .into_iter()
        .filter(|(_, aor)| *aor == global_max)
        .map(|(submission, _)| submission)
        .max()
}
