use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::process::normalize::NormalizedRecord;
use crate::stats::processing::{
    estimate_acknowledgement, processing_trend, rolling_average, TrendPoint,
};
use crate::stats::stages::{stage_durations, DurationWindow, StageDuration};
use crate::stats::{
    adr_count, filter_records, latest_events, province_distribution, province_options,
    pvo_distribution, svo_distribution, timeline, DayCount, OfficeCount, ProvinceCount,
};

#[derive(Debug, Clone, Default)]
pub struct DashboardParams {
    pub province: Option<String>,
    pub query: Option<String>,
    pub window: DurationWindow,
    pub submission_date: Option<NaiveDate>,
}

/// Every derived view over one record collection, computed in one pass of
/// pure functions. Nothing here is cached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total: usize,
    pub matched: usize,
    pub adr_count: usize,
    pub provinces: Vec<String>,
    pub province_distribution: Vec<ProvinceCount>,
    pub timeline: Vec<DayCount>,
    pub pvo: Vec<OfficeCount>,
    pub svo: Vec<OfficeCount>,
    pub stage_window_months: i64,
    pub stage_durations: Vec<StageDuration>,
    pub processing_trend: Vec<TrendPoint>,
    pub avg_processing_days_30: Option<f64>,
    pub estimated_aor: Option<NaiveDate>,
    pub latest_events: Vec<NormalizedRecord>,
}

impl Dashboard {
    pub fn build(
        records: &[NormalizedRecord],
        params: &DashboardParams,
        now: DateTime<Utc>,
    ) -> Self {
        let filtered = filter_records(
            records,
            params.province.as_deref(),
            params.query.as_deref(),
        );
        let avg30 = rolling_average(&filtered, now);

        Dashboard {
            total: records.len(),
            matched: filtered.len(),
            adr_count: adr_count(&filtered),
            provinces: province_options(records),
            province_distribution: province_distribution(&filtered),
            timeline: timeline(&filtered),
            pvo: pvo_distribution(&filtered),
            svo: svo_distribution(&filtered),
            stage_window_months: params.window.months(),
            stage_durations: stage_durations(&filtered, params.window, now),
            processing_trend: processing_trend(&filtered, now),
            avg_processing_days_30: avg30,
            estimated_aor: estimate_acknowledgement(params.submission_date, avg30),
            latest_events: latest_events(&filtered, now),
        }
    }
}
