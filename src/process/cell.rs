use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// A typed scalar taken out of a single sheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Number(_) => None,
        }
    }

    /// Empty strings count as blank; numbers never do.
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// True when the cell carries something other than null or "".
pub fn is_filled(cell: &Option<CellValue>) -> bool {
    cell.as_ref().is_some_and(|v| !v.is_blank())
}

static GVIZ_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Date\((\d+),\s*(\d+),\s*(\d+)\)$").expect("gviz date regex"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%a %b %d %Y",
    "%a, %d %b %Y",
];

/// Parses `Date(y, m, d)` with a zero-based month.
fn parse_gviz_date(s: &str) -> Option<NaiveDate> {
    let caps = GVIZ_DATE.captures(s)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month.checked_add(1)?, day)
}

fn parse_human_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })
}

/// Recognises the gviz `Date(..)` encoding first, then common human-readable
/// layouts. Four-digit years only, so the ISO rendering stays `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_gviz_date(trimmed)
        .or_else(|| parse_human_date(trimmed))
        .filter(|d| (1000..=9999).contains(&chrono::Datelike::year(d)))
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// String literals become ISO dates when they parse as one, otherwise they
/// are trimmed. Numbers pass through untouched.
pub fn parse_cell(raw: Option<&serde_json::Value>) -> Option<CellValue> {
    match raw? {
        serde_json::Value::String(s) => Some(match parse_date(s) {
            Some(date) => CellValue::Text(to_iso(date)),
            None => CellValue::text(s.trim()),
        }),
        serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> Option<CellValue> {
        parse_cell(Some(&v))
    }

    #[test]
    fn absent_and_null_cells_are_none() {
        assert_eq!(parse_cell(None), None);
        assert_eq!(parse(json!(null)), None);
        assert_eq!(parse(json!(true)), None);
    }

    #[test]
    fn numbers_are_kept_as_numbers() {
        assert_eq!(parse(json!(42)), Some(CellValue::Number(42.0)));
        assert_eq!(parse(json!(3.5)), Some(CellValue::Number(3.5)));
    }

    #[test]
    fn gviz_date_month_is_zero_based() {
        assert_eq!(parse(json!("Date(2025,0,15)")), Some(CellValue::text("2025-01-15")));
        assert_eq!(parse(json!("Date(2024, 11, 31)")), Some(CellValue::text("2024-12-31")));
    }

    #[test]
    fn invalid_gviz_date_falls_back_to_text() {
        assert_eq!(parse(json!("Date(2025,12,40)")), Some(CellValue::text("Date(2025,12,40)")));
    }

    #[test]
    fn human_readable_dates_normalise_to_iso() {
        assert_eq!(parse(json!("1/15/2025")), Some(CellValue::text("2025-01-15")));
        assert_eq!(parse(json!("January 15, 2025")), Some(CellValue::text("2025-01-15")));
        assert_eq!(parse(json!("15-Jan-2025")), Some(CellValue::text("2025-01-15")));
        assert_eq!(parse(json!("2025/01/15")), Some(CellValue::text("2025-01-15")));
        assert_eq!(
            parse(json!("2025-01-15T22:00:00Z")),
            Some(CellValue::text("2025-01-15"))
        );
    }

    #[test]
    fn iso_dates_round_trip_unchanged() {
        for year in 2020..=2030 {
            for (m, d) in [(1, 1), (2, 28), (6, 30), (12, 31)] {
                let iso = format!("{:04}-{:02}-{:02}", year, m, d);
                assert_eq!(parse(json!(iso.clone())), Some(CellValue::Text(iso)));
            }
        }
    }

    #[test]
    fn plain_text_is_trimmed() {
        assert_eq!(parse(json!("  Vancouver ")), Some(CellValue::text("Vancouver")));
        assert_eq!(parse(json!("   ")), Some(CellValue::text("")));
        assert_eq!(parse(json!("12")), Some(CellValue::text("12")));
    }

    #[test]
    fn display_formats_numbers_without_trailing_zero() {
        assert_eq!(CellValue::Number(5.0).to_string(), "5");
        assert_eq!(CellValue::Number(5.5).to_string(), "5.5");
    }
}
