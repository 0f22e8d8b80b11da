// src/fetch/sheet.rs

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::process::{load_sheet, SheetResponse};

const GVIZ_BASE: &str = "https://docs.google.com/spreadsheets/d/";
pub const DEFAULT_SHEET_ID: &str = "1ioxtqGnbHi6khSQ4ErvA1SgLgJgmo2LbPxEb01YRRx8";
pub const DEFAULT_SHEET_GID: &str = "397033753";

/// Locates one tab of one spreadsheet. Missing parts come from `SheetDefaults`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SheetSource {
    pub sheet_id: Option<String>,
    pub gid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDefaults {
    pub sheet_id: String,
    pub gid: String,
}

impl Default for SheetDefaults {
    fn default() -> Self {
        Self {
            sheet_id: DEFAULT_SHEET_ID.to_string(),
            gid: DEFAULT_SHEET_GID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl SheetSource {
    pub fn new(sheet_id: impl Into<String>, gid: impl Into<String>) -> Self {
        Self {
            sheet_id: Some(sheet_id.into()),
            gid: Some(gid.into()),
        }
    }

    /// The gviz JSON export URL for this tab.
    pub fn url(&self, defaults: &SheetDefaults) -> Result<Url> {
        let sheet_id = self.sheet_id.as_deref().unwrap_or(&defaults.sheet_id);
        let gid = self.gid.as_deref().unwrap_or(&defaults.gid);
        let mut url = Url::parse(GVIZ_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("gviz base URL cannot take path segments"))?
            .pop_if_empty()
            .extend([sheet_id, "gviz", "tq"]);
        url.query_pairs_mut()
            .append_pair("tqx", "out:json")
            .append_pair("gid", gid);
        Ok(url)
    }
}

async fn get_text_core(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))
}

async fn get_text_with_retry(client: &Client, url: &Url, retry: RetryPolicy) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_text_core(client, url).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < retry.max_retries => {
                attempts += 1;
                let backoff = retry.backoff_ms(attempts);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

/// Fetches one tab and runs it through the ingestion pipeline.
#[instrument(level = "info", skip(client, defaults, retry))]
pub async fn fetch_sheet_data(
    client: &Client,
    source: &SheetSource,
    defaults: &SheetDefaults,
    retry: RetryPolicy,
) -> Result<SheetResponse> {
    let url = source.url(defaults)?;
    let text = get_text_with_retry(client, &url, retry).await?;
    load_sheet(&text, Utc::now()).with_context(|| format!("parsing gviz payload from {}", url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_gviz_json_export() -> Result<()> {
        let url = SheetSource::new("abc123", "42").url(&SheetDefaults::default())?;
        assert_eq!(url.host_str(), Some("docs.google.com"));
        assert_eq!(url.path(), "/spreadsheets/d/abc123/gviz/tq");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tqx".to_string(), "out:json".to_string()),
                ("gid".to_string(), "42".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_parts_use_defaults() -> Result<()> {
        let defaults = SheetDefaults {
            sheet_id: "fallback".into(),
            gid: "7".into(),
        };
        let url = SheetSource {
            sheet_id: None,
            gid: Some("9".into()),
        }
        .url(&defaults)?;
        assert_eq!(url.path(), "/spreadsheets/d/fallback/gviz/tq");
        assert!(url.query().unwrap_or_default().ends_with("gid=9"));

        let url = SheetSource::default().url(&defaults)?;
        assert!(url.query().unwrap_or_default().ends_with("gid=7"));
        Ok(())
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff_ms(1), 500);
        assert_eq!(retry.backoff_ms(3), 2000);
        assert_eq!(retry.backoff_ms(100), u64::MAX);
        assert_eq!(retry.backoff_ms(u32::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        let client = Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let retry = RetryPolicy {
            max_retries: 1,
            initial_backoff_ms: 1,
        };
        assert!(get_text_with_retry(&client, &url, retry).await.is_err());
    }
}
