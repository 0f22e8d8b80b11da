use anyhow::Result;
use chrono::NaiveDate;
use std::{env, str::FromStr, time::Duration};

use crate::error::TrackerError;
use crate::fetch::{builtin_sources, load_sources, RetryPolicy, SheetDefaults, SourceOption, ALL_SOURCES};
use crate::process::cell::parse_date;
use crate::stats::dashboard::DashboardParams;
use crate::stats::stages::DurationWindow;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub source_key: String,
    pub defaults: SheetDefaults,
    pub sources: Vec<SourceOption>,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub dashboard: DashboardParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_key: ALL_SOURCES.to_string(),
            defaults: SheetDefaults::default(),
            sources: builtin_sources(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            dashboard: DashboardParams::default(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, TrackerError> {
    value
        .trim()
        .parse()
        .map_err(|_| TrackerError::Config(format!("{} has invalid value '{}'", name, value)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from `TRACKER_*` variables; unset ones keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        let var = |name: &str| non_empty(lookup(name));

        if let Some(key) = var("TRACKER_SOURCE") {
            config.source_key = key;
        }
        if let Some(id) = var("TRACKER_SHEET_ID") {
            config.defaults.sheet_id = id;
        }
        if let Some(gid) = var("TRACKER_SHEET_GID") {
            config.defaults.gid = gid;
        }
        if let Some(path) = var("TRACKER_SOURCES_FILE") {
            config.sources = load_sources(path)?;
        }
        if let Some(v) = var("TRACKER_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(parse_var("TRACKER_CACHE_TTL_SECS", &v)?);
        }
        if let Some(v) = var("TRACKER_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_var("TRACKER_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("TRACKER_MAX_RETRIES") {
            config.retry.max_retries = parse_var("TRACKER_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("TRACKER_WINDOW_MONTHS") {
            let months: u32 = parse_var("TRACKER_WINDOW_MONTHS", &v)?;
            config.dashboard.window = DurationWindow::try_from(months)?;
        }
        if let Some(v) = var("TRACKER_SUBMISSION_DATE") {
            let date: NaiveDate = parse_date(&v).ok_or_else(|| {
                TrackerError::Config(format!("TRACKER_SUBMISSION_DATE has invalid value '{}'", v))
            })?;
            config.dashboard.submission_date = Some(date);
        }
        config.dashboard.province = var("TRACKER_PROVINCE");
        config.dashboard.query = var("TRACKER_QUERY");

        Ok(config)
    }
}
