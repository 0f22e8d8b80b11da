use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::process::normalize::NormalizedRecord;
use crate::process::utils::{elapsed_days, is_display_year, midnight_utc, MS_PER_DAY};
use crate::stats::stages::Milestone;

pub const TREND_WINDOW_DAYS: i64 = 90;
pub const ROLLING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `YYYY-MM` of the acknowledgement date.
    pub month: String,
    pub avg_days: f64,
    pub count: usize,
}

fn revalidate(date: Option<NaiveDate>) -> Option<NaiveDate> {
    date.filter(|d| is_display_year(*d))
}

/// Cohort date, else the earliest date on the record.
pub fn submission_of(record: &NormalizedRecord) -> Option<NaiveDate> {
    revalidate(record.submission_date()).or(revalidate(record.first_date))
}

/// AOR column, else the latest date on the record.
pub fn acknowledgement_of(record: &NormalizedRecord) -> Option<NaiveDate> {
    Milestone::Aor
        .resolve(&record.raw)
        .or(revalidate(record.latest_date))
}

/// `(acknowledgement date, days from submission)` for every record
/// acknowledged within the trailing `days` ending at `now`.
fn samples(
    records: &[NormalizedRecord],
    days: i64,
    now: DateTime<Utc>,
) -> impl Iterator<Item = (NaiveDate, i64)> + '_ {
    let start = now - Duration::days(days);
    records.iter().filter_map(move |r| {
        let submitted = submission_of(r)?;
        let ack = acknowledgement_of(r)?;
        let at = midnight_utc(ack);
        (at >= start && at <= now).then(|| (ack, elapsed_days(submitted, ack)))
    })
}

/// Monthly average submission → AOR latency over the trailing 90 days.
pub fn processing_trend(records: &[NormalizedRecord], now: DateTime<Utc>) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<String, (i64, usize)> = BTreeMap::new();
    for (ack, days) in samples(records, TREND_WINDOW_DAYS, now) {
        let bucket = buckets.entry(ack.format("%Y-%m").to_string()).or_default();
        bucket.0 += days;
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(month, (total, count))| TrendPoint {
            month,
            avg_days: total as f64 / count as f64,
            count,
        })
        .collect()
}

/// Average submission → AOR latency over the trailing 30 days.
pub fn rolling_average(records: &[NormalizedRecord], now: DateTime<Utc>) -> Option<f64> {
    let (total, count) = samples(records, ROLLING_WINDOW_DAYS, now)
        .fold((0i64, 0usize), |(t, c), (_, days)| (t + days, c + 1));
    (count > 0).then(|| total as f64 / count as f64)
}

/// Projected AOR date for someone who submitted on `submitted`.
pub fn estimate_acknowledgement(
    submitted: Option<NaiveDate>,
    average_days: Option<f64>,
) -> Option<NaiveDate> {
    let (submitted, avg) = (submitted?, average_days?);
    if !avg.is_finite() {
        return None;
    }
    let offset = Duration::try_milliseconds((avg * MS_PER_DAY as f64).round() as i64)?;
    midnight_utc(submitted)
        .checked_add_signed(offset)
        .map(|at| at.date_naive())
}
