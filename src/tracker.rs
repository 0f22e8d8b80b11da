// src/tracker.rs

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use reqwest::Client;
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::fetch::{fetch_sheet_data, select, RetryPolicy, SheetDefaults, SourceOption};
use crate::process::normalize::NormalizedRecord;
use crate::process::SheetResponse;

struct CachedEntry<T> {
    data: T,
    stored_at: Instant,
}

/// Keyed TTL cache. Two concurrent misses on one key both recompute; the
/// last writer wins, which is harmless because loading is idempotent.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<T> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| now.saturating_duration_since(e.stored_at) < self.ttl)
            .map(|e| e.data.clone())
    }

    pub fn insert_at(&self, key: impl Into<String>, data: T, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.into(),
            CachedEntry {
                data,
                stored_at: now,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: impl Into<String>, data: T) {
        self.insert_at(key, data, Instant::now())
    }
}

/// Records from every selected source, tagged with their source label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerPayload {
    pub records: Vec<NormalizedRecord>,
    pub latest_submission_with_aor: Option<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
    pub source_key: String,
}

pub fn cache_key(source_key: &str) -> String {
    format!("tracker_{}", source_key)
}

pub fn merge_results(
    source_key: &str,
    results: Vec<(SourceOption, SheetResponse)>,
    now: DateTime<Utc>,
) -> TrackerPayload {
    let latest_submission_with_aor = results
        .iter()
        .filter_map(|(_, sheet)| sheet.latest_submission_with_aor)
        .max();
    let records = results
        .into_iter()
        .flat_map(|(source, sheet)| {
            sheet
                .records
                .into_iter()
                .map(move |r| r.with_source(&source.label))
        })
        .collect();
    TrackerPayload {
        records,
        latest_submission_with_aor,
        fetched_at: now,
        source_key: source_key.to_string(),
    }
}

/// Loads and merges sources behind a TTL cache.
pub struct TrackerService {
    client: Client,
    sources: Vec<SourceOption>,
    defaults: SheetDefaults,
    retry: RetryPolicy,
    cache: TtlCache<TrackerPayload>,
}

impl TrackerService {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            sources: config.sources.clone(),
            defaults: config.defaults.clone(),
            retry: config.retry,
            cache: TtlCache::new(config.cache_ttl),
        }
    }

    /// Fetches every selected source concurrently. Any failure fails the
    /// whole load and leaves the cache untouched.
    #[instrument(level = "info", skip(self))]
    pub async fn load(&self, source_key: &str) -> Result<TrackerPayload> {
        let key = cache_key(source_key);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(hit);
        }

        let selected = select(&self.sources, source_key)?;
        info!(sources = selected.len(), "cache miss; fetching");
        let results = try_join_all(selected.into_iter().map(|source| async move {
            let sheet = fetch_sheet_data(
                &self.client,
                &source.sheet_source(),
                &self.defaults,
                self.retry,
            )
            .await
            .with_context(|| format!("loading source {}", source.key))?;
            Ok::<_, anyhow::Error>((source.clone(), sheet))
        }))
        .await?;

        let payload = merge_results(source_key, results, Utc::now());
        info!(records = payload.records.len(), "merged sources");
        self.cache.insert(key, payload.clone());
        Ok(payload)
    }
}
