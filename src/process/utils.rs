use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;

use crate::process::cell::CellValue;

/// Years accepted while scanning the sheet (section markers, AOR columns).
pub const INGEST_YEAR_RANGE: RangeInclusive<i32> = 2010..=2035;

/// Years accepted when deriving dates for display and statistics.
/// Deliberately narrower than `INGEST_YEAR_RANGE`; the two are not unified.
pub const DISPLAY_YEAR_RANGE: RangeInclusive<i32> = 2020..=2030;

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("iso date regex"));
static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("header regex"));

/// Lower-case, collapse non-alphanumeric runs to `_`, strip edge underscores.
/// Missing, numeric, or fully-stripped headers fall back to `col_<n>` (1-based).
pub fn normalize_header(header: Option<&CellValue>, index: usize) -> String {
    let fallback = || format!("col_{}", index + 1);
    let Some(text) = header.and_then(CellValue::as_text) else {
        return fallback();
    };
    let lowered = text.to_lowercase();
    let key = NON_ALNUM.replace_all(&lowered, "_");
    let key = key.trim_matches('_');
    if key.is_empty() {
        fallback()
    } else {
        key.to_string()
    }
}

pub fn is_iso_date(s: &str) -> bool {
    ISO_DATE.is_match(s)
}

fn iso_in_range(value: Option<&CellValue>, years: &RangeInclusive<i32>) -> Option<NaiveDate> {
    let s = value?.as_text()?;
    if !is_iso_date(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .filter(|d| years.contains(&d.year()))
}

/// A strict `YYYY-MM-DD` cell whose year falls in `INGEST_YEAR_RANGE`.
pub fn ingest_date(value: Option<&CellValue>) -> Option<NaiveDate> {
    iso_in_range(value, &INGEST_YEAR_RANGE)
}

/// A strict `YYYY-MM-DD` cell whose year falls in `DISPLAY_YEAR_RANGE`.
pub fn display_date(value: Option<&CellValue>) -> Option<NaiveDate> {
    iso_in_range(value, &DISPLAY_YEAR_RANGE)
}

pub fn is_display_year(date: NaiveDate) -> bool {
    DISPLAY_YEAR_RANGE.contains(&date.year())
}

pub fn display_date_str(value: &str) -> Option<NaiveDate> {
    display_date(Some(&CellValue::text(value)))
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Whole days from `from` to `to`, rounded to the nearest day and clamped at zero.
pub fn elapsed_days(from: NaiveDate, to: NaiveDate) -> i64 {
    let ms = (midnight_utc(to) - midnight_utc(from)).num_milliseconds();
    ((ms as f64) / (MS_PER_DAY as f64)).round().max(0.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_snake_cased() {
        let h = |s: &str| normalize_header(Some(&CellValue::text(s)), 0);
        assert_eq!(h("Name"), "name");
        assert_eq!(h("PNP Category"), "pnp_category");
        assert_eq!(h("  ADR (if any) / Return Date "), "adr_if_any_return_date");
        assert_eq!(h("PVO--Inland"), "pvo_inland");
    }

    #[test]
    fn headers_fall_back_to_position() {
        assert_eq!(normalize_header(None, 0), "col_1");
        assert_eq!(normalize_header(Some(&CellValue::Number(3.0)), 4), "col_5");
        assert_eq!(normalize_header(Some(&CellValue::text("")), 9), "col_10");
        assert_eq!(normalize_header(Some(&CellValue::text("省份")), 2), "col_3");
    }

    #[test]
    fn year_windows_differ() {
        let v = CellValue::text("2015-06-01");
        assert!(ingest_date(Some(&v)).is_some());
        assert!(display_date(Some(&v)).is_none());

        let v = CellValue::text("2031-01-01");
        assert!(ingest_date(Some(&v)).is_some());
        assert!(display_date(Some(&v)).is_none());

        let v = CellValue::text("2036-01-01");
        assert!(ingest_date(Some(&v)).is_none());
    }

    #[test]
    fn date_checks_reject_non_iso() {
        assert!(display_date(Some(&CellValue::text("2025-1-5"))).is_none());
        assert!(display_date(Some(&CellValue::text("2025-02-30"))).is_none());
        assert!(display_date(Some(&CellValue::Number(2025.0))).is_none());
        assert!(display_date(None).is_none());
    }

    #[test]
    fn elapsed_days_never_negative() {
        let a = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(elapsed_days(a, b), 21);
        assert_eq!(elapsed_days(b, a), 0);
        assert_eq!(elapsed_days(a, a), 0);
    }
}
