use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::process::cell::CellValue;
use crate::process::extract::ParsedRecord;
use crate::process::utils::{display_date, is_display_year};

/// Canonical fields resolved from a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Province,
    Stream,
    Adr,
    Pvo,
    Svo,
}

/// Source keys tried in order; the first non-empty one wins. Adding an alias
/// is a change to this table only.
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Name, &["name", "col_2"]),
    (Field::Province, &["province", "col_3"]),
    (Field::Stream, &["pnp_category", "stream", "col_4"]),
    (Field::Adr, &["adr_if_any_return_date", "adr", "col_7"]),
    (Field::Pvo, &["pvo_inland", "col_10"]),
    (Field::Svo, &["svo_inland", "col_11"]),
];

pub fn aliases(field: Field) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

const PROVINCE_CODES: &[(&str, &str)] = &[
    ("AB", "AB"),
    ("ALBERTA", "AB"),
    ("BC", "BC"),
    ("BRITISHCOLUMBIA", "BC"),
    ("MB", "MB"),
    ("MANITOBA", "MB"),
    ("ON", "ON"),
    ("ONTARIO", "ON"),
    ("PE", "PE"),
    ("PEI", "PE"),
    ("PRINCEEDWARDISLAND", "PE"),
    ("SK", "SK"),
    ("SASKATCHEWAN", "SK"),
    ("NB", "NB"),
    ("NEWBRUNSWICK", "NB"),
    ("NS", "NS"),
    ("NOVASCOTIA", "NS"),
    ("NL", "NL"),
    ("NEWFOUNDLANDANDLABRADOR", "NL"),
    ("NT", "NT"),
    ("NWT", "NT"),
    ("NORTHWESTTERRITORIES", "NT"),
    ("NU", "NU"),
    ("NUNAVUT", "NU"),
    ("YT", "YT"),
    ("YUKON", "YT"),
    ("QC", "QC"),
    ("QUEBEC", "QC"),
];

/// Checked in order against compound labels such as "OINP - Masters".
const PROVINCE_FRAGMENTS: &[(&str, &str)] = &[
    ("OINP", "ON"),
    ("ONTARIO", "ON"),
    ("BRITISHCOLUMBIA", "BC"),
    ("MANITOBA", "MB"),
    ("SASKATCHEWAN", "SK"),
    ("ALBERTA", "AB"),
    ("YUKON", "YT"),
    ("NUNAVUT", "NU"),
    ("NORTHWESTTERRITORIES", "NT"),
    ("NWT", "NT"),
];

const MAX_OFFICE_LEN: usize = 40;

static DATE_SHAPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$").expect("date-shaped regex"));

/// A record with its canonical fields resolved, still carrying the raw row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub name: String,
    pub province: String,
    pub stream: String,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub adr: String,
    pub pvo: String,
    pub svo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub raw: ParsedRecord,
}

impl NormalizedRecord {
    pub fn submission_date(&self) -> Option<NaiveDate> {
        self.raw.submission_date
    }

    /// Tags both views with the label of the sheet the row came from.
    pub fn with_source(mut self, label: &str) -> Self {
        self.source = Some(label.to_string());
        self.raw.source = Some(label.to_string());
        self
    }
}

/// Maps a name or code onto one of the 13 two-letter codes. Unknown strings
/// of three characters or fewer are kept as typed; anything longer is dropped.
pub fn normalize_province(value: &str) -> String {
    let cleaned = value.trim().to_uppercase();
    if cleaned.is_empty() {
        return String::new();
    }
    let simplified: String = cleaned.chars().filter(|c| c.is_ascii_uppercase()).collect();

    if let Some((_, code)) = PROVINCE_CODES.iter().find(|(k, _)| *k == simplified) {
        return code.to_string();
    }
    if let Some((_, code)) = PROVINCE_FRAGMENTS
        .iter()
        .find(|(frag, _)| simplified.contains(frag))
    {
        return code.to_string();
    }
    if cleaned.chars().count() <= 3 {
        cleaned
    } else {
        String::new()
    }
}

/// Office cells that hold a date or a long note were scraped from the wrong
/// column; those become empty.
pub fn normalize_office(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed == "-"
        || display_date(Some(&CellValue::text(trimmed))).is_some()
        || DATE_SHAPED.is_match(trimmed)
        || trimmed.chars().count() > MAX_OFFICE_LEN
    {
        return String::new();
    }
    trimmed.to_string()
}

fn first_text(record: &ParsedRecord, field: Field, clean: impl Fn(&str) -> String) -> String {
    aliases(field)
        .iter()
        .filter_map(|key| record.get(key))
        .map(|v| clean(&v.to_string()))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Min and max display date over every cell and the cohort date.
fn date_span(record: &ParsedRecord) -> (Option<NaiveDate>, Option<NaiveDate>) {
    record
        .values()
        .filter_map(|v| display_date(Some(v)))
        .chain(record.submission_date.filter(|d| is_display_year(*d)))
        .fold((None, None), |(lo, hi): (Option<NaiveDate>, Option<NaiveDate>), d| {
            (
                Some(lo.map_or(d, |lo| lo.min(d))),
                Some(hi.map_or(d, |hi| hi.max(d))),
            )
        })
}

pub fn normalize(record: &ParsedRecord) -> NormalizedRecord {
    let trim = |s: &str| s.trim().to_string();
    let (first_date, latest_date) = date_span(record);
    NormalizedRecord {
        name: first_text(record, Field::Name, trim),
        province: first_text(record, Field::Province, normalize_province),
        stream: first_text(record, Field::Stream, trim),
        first_date,
        latest_date,
        adr: first_text(record, Field::Adr, trim),
        pvo: first_text(record, Field::Pvo, normalize_office),
        svo: first_text(record, Field::Svo, normalize_office),
        source: record.source.clone(),
        raw: record.clone(),
    }
}

pub fn normalize_all(records: &[ParsedRecord]) -> Vec<NormalizedRecord> {
    records.iter().map(normalize).collect()
}
