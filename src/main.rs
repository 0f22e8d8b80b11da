use anyhow::{Context, Result};
use chrono::Utc;
use pnptracker::{config::Config, stats::dashboard::Dashboard, tracker::TrackerService};
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pnptracker=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) config + client ──────────────────────────────────────────
    let config = Config::from_env()?;
    let client = Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("building HTTP client")?;
    let service = TrackerService::new(client, &config);

    // ─── 3) load every selected source ───────────────────────────────
    let payload = match service.load(&config.source_key).await {
        Ok(p) => p,
        Err(e) => {
            error!("load failed: {:#}", e);
            return Err(e);
        }
    };
    info!(
        source = %payload.source_key,
        records = payload.records.len(),
        "loaded"
    );

    // ─── 4) derive views and print ───────────────────────────────────
    let dashboard = Dashboard::build(&payload.records, &config.dashboard, Utc::now());
    let out = json!({
        "sourceKey": payload.source_key,
        "fetchedAt": payload.fetched_at,
        "latestSubmissionWithAor": payload.latest_submission_with_aor,
        "dashboard": dashboard,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    info!("all done");
    Ok(())
}
