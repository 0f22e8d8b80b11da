// src/stats/mod.rs
pub mod dashboard;
pub mod processing;
pub mod stages;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::process::normalize::NormalizedRecord;
use crate::process::utils::{display_date_str, is_display_year, midnight_utc};

pub const UNKNOWN_PROVINCE: &str = "Unknown";
pub const TOP_OFFICES: usize = 10;
pub const LATEST_EVENTS_DAYS: i64 = 30;
pub const LATEST_EVENTS_LIMIT: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvinceCount {
    pub province: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficeCount {
    pub city: String,
    pub value: usize,
}

/// Counts sorted by count descending; ties stay in key order.
fn ranked<K: Ord>(counts: BTreeMap<K, usize>) -> Vec<(K, usize)> {
    let mut out: Vec<(K, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

pub fn province_distribution(records: &[NormalizedRecord]) -> Vec<ProvinceCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in records {
        let key = if r.province.is_empty() {
            UNKNOWN_PROVINCE.to_string()
        } else {
            r.province.clone()
        };
        *counts.entry(key).or_default() += 1;
    }
    ranked(counts)
        .into_iter()
        .map(|(province, value)| ProvinceCount { province, value })
        .collect()
}

/// Per-day counts keyed by cohort date, falling back to the earliest and then
/// latest date on the record. The chosen date must be in display years.
pub fn timeline(records: &[NormalizedRecord]) -> Vec<DayCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for r in records {
        let picked = r.submission_date().or(r.first_date).or(r.latest_date);
        if let Some(date) = picked.filter(|d| is_display_year(*d)) {
            *counts.entry(date).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(date, value)| DayCount { date, value })
        .collect()
}

fn office_distribution<'a>(offices: impl Iterator<Item = &'a str>) -> Vec<OfficeCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for office in offices.map(str::trim) {
        if office.is_empty() || office == "-" || display_date_str(office).is_some() {
            continue;
        }
        *counts.entry(office.to_string()).or_default() += 1;
    }
    ranked(counts)
        .into_iter()
        .take(TOP_OFFICES)
        .map(|(city, value)| OfficeCount { city, value })
        .collect()
}

pub fn pvo_distribution(records: &[NormalizedRecord]) -> Vec<OfficeCount> {
    office_distribution(records.iter().map(|r| r.pvo.as_str()))
}

pub fn svo_distribution(records: &[NormalizedRecord]) -> Vec<OfficeCount> {
    office_distribution(records.iter().map(|r| r.svo.as_str()))
}

/// Keeps records matching the province (`None` or "all" keeps every province)
/// and whose name, province or stream contains `query`, case-insensitively.
pub fn filter_records(
    records: &[NormalizedRecord],
    province: Option<&str>,
    query: Option<&str>,
) -> Vec<NormalizedRecord> {
    let province = province
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("all"))
        .map(str::to_uppercase);
    let keyword = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    records
        .iter()
        .filter(|r| {
            province
                .as_deref()
                .map_or(true, |p| r.province.to_uppercase() == p)
        })
        .filter(|r| {
            keyword.as_deref().map_or(true, |k| {
                [&r.name, &r.province, &r.stream]
                    .iter()
                    .any(|field| field.to_lowercase().contains(k))
            })
        })
        .cloned()
        .collect()
}

pub fn province_options(records: &[NormalizedRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.province.is_empty())
        .map(|r| r.province.to_uppercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Newest activity first; records with no usable date go last.
pub fn sort_by_latest(records: &[NormalizedRecord]) -> Vec<NormalizedRecord> {
    let key = |r: &NormalizedRecord| {
        r.latest_date
            .filter(|d| is_display_year(*d))
            .or(r.first_date.filter(|d| is_display_year(*d)))
    };
    let mut out = records.to_vec();
    out.sort_by(|a, b| key(b).cmp(&key(a)));
    out
}

/// Records whose latest date falls in the trailing 30 days, newest first.
pub fn latest_events(records: &[NormalizedRecord], now: DateTime<Utc>) -> Vec<NormalizedRecord> {
    let start = now - Duration::days(LATEST_EVENTS_DAYS);
    let mut out: Vec<NormalizedRecord> = records
        .iter()
        .filter(|r| {
            r.latest_date
                .filter(|d| is_display_year(*d))
                .map(midnight_utc)
                .is_some_and(|t| t >= start && t <= now)
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| b.latest_date.cmp(&a.latest_date));
    out.truncate(LATEST_EVENTS_LIMIT);
    out
}

pub fn adr_count(records: &[NormalizedRecord]) -> usize {
    records.iter().filter(|r| !r.adr.is_empty()).count()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::process::cell::CellValue;
    use crate::process::extract::ParsedRecord;
    use crate::process::normalize::{normalize, NormalizedRecord};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    pub fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    /// Builds a normalised record from raw key/value pairs.
    pub fn rec(submission: Option<&str>, pairs: &[(&str, &str)]) -> NormalizedRecord {
        let raw = ParsedRecord {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Some(CellValue::text(*v))))
                .collect(),
            submission_date: submission.map(day),
            source: None,
        };
        normalize(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{day, now, rec};
    use super::*;

    #[test]
    fn provinces_ranked_with_unknown_bucket() {
        let records = vec![
            rec(None, &[("name", "a"), ("province", "ON")]),
            rec(None, &[("name", "b"), ("province", "Ontario")]),
            rec(None, &[("name", "c"), ("province", "BC")]),
            rec(None, &[("name", "d")]),
            rec(None, &[("name", "e"), ("province", "Atlantis")]),
        ];
        let dist = province_distribution(&records);
        assert_eq!(dist[0], ProvinceCount { province: "ON".into(), value: 2 });
        assert_eq!(dist.len(), 3);
        assert!(dist.contains(&ProvinceCount { province: UNKNOWN_PROVINCE.into(), value: 2 }));
        assert!(dist.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn empty_inputs_give_empty_outputs() {
        assert!(province_distribution(&[]).is_empty());
        assert!(timeline(&[]).is_empty());
        assert!(pvo_distribution(&[]).is_empty());
        assert!(latest_events(&[], now()).is_empty());
        assert_eq!(adr_count(&[]), 0);
    }

    #[test]
    fn timeline_prefers_cohort_date() {
        let records = vec![
            rec(Some("2025-01-15"), &[("name", "a"), ("aor", "2025-02-01")]),
            rec(None, &[("name", "b"), ("aor", "2025-02-01")]),
            rec(Some("2025-01-15"), &[("name", "c")]),
            // cohort date outside display years is not replaced by a fallback
            rec(Some("2015-01-01"), &[("name", "d"), ("aor", "2025-02-01")]),
            rec(None, &[("name", "e")]),
        ];
        let tl = timeline(&records);
        assert_eq!(
            tl,
            vec![
                DayCount { date: day("2025-01-15"), value: 2 },
                DayCount { date: day("2025-02-01"), value: 1 },
            ]
        );
    }

    #[test]
    fn offices_top_ten_without_dates() {
        let mut records: Vec<NormalizedRecord> = (0..12)
            .map(|i| rec(None, &[("name", "x"), ("pvo_inland", format!("Office {:02}", i).as_str())]))
            .collect();
        records.push(rec(None, &[("name", "y"), ("pvo_inland", "Office 03")]));
        records.push(rec(None, &[("name", "z"), ("pvo_inland", "2025-01-01")]));
        let dist = pvo_distribution(&records);
        assert_eq!(dist.len(), TOP_OFFICES);
        assert_eq!(dist[0], OfficeCount { city: "Office 03".into(), value: 2 });
        assert!(dist.iter().all(|o| o.city != "2025-01-01"));
        assert!(svo_distribution(&records).is_empty());
    }

    #[test]
    fn filters_by_province_and_keyword() {
        let records = vec![
            rec(None, &[("name", "Alice"), ("province", "ON"), ("stream", "HCP")]),
            rec(None, &[("name", "Bob"), ("province", "BC"), ("stream", "Tech")]),
            rec(None, &[("name", "Cara"), ("province", "ON"), ("stream", "Tech")]),
        ];
        assert_eq!(filter_records(&records, None, None).len(), 3);
        assert_eq!(filter_records(&records, Some("all"), Some("  ")).len(), 3);
        assert_eq!(filter_records(&records, Some("on"), None).len(), 2);
        let hits = filter_records(&records, Some("ON"), Some("tech"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Cara");
        assert_eq!(province_options(&records), vec!["BC", "ON"]);
    }

    #[test]
    fn sorting_and_recent_events() {
        let records = vec![
            rec(None, &[("name", "old"), ("aor", "2025-01-01")]),
            rec(None, &[("name", "none")]),
            rec(None, &[("name", "new"), ("aor", "2025-06-10")]),
            rec(None, &[("name", "mid"), ("aor", "2025-05-20"), ("adr", "yes")]),
        ];
        let names: Vec<String> = sort_by_latest(&records).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["new", "mid", "old", "none"]);

        let recent: Vec<String> = latest_events(&records, now()).into_iter().map(|r| r.name).collect();
        assert_eq!(recent, vec!["new", "mid"]);
        assert_eq!(adr_count(&records), 1);
    }
}
