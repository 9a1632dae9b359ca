//! Metrics for the draw scraper
//!
//! Metrics are recorded through the `metrics` facade. `init` installs a
//! Prometheus recorder; at the end of a run `push_to_gateway` sends the
//! rendered snapshot to a Pushgateway when `LOTTERY_PUSHGATEWAY_URL` is set.
//! Without `init` the recording calls are no-ops, which is what tests rely on.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const PUSHGATEWAY_ENV: &str = "LOTTERY_PUSHGATEWAY_URL";
const JOB_NAME: &str = "lottery_scraper";

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Fetch
    FetchPagesSuccess,
    FetchTimeouts,
    FetchErrors,
    FetchDuration,
    FetchPageBytes,

    // Parser
    ParserRowsSeen,
    ParserRowsRejected,

    // Scrape controller
    ScrapeRecordsAccepted,
    ScrapeRowsOutOfWindow,
    ScrapeRowsKnown,
    ScrapeStops,

    // Store
    StoreRowsWritten,
    StoreNewRows,
    StoreWritesSkipped,

    // Run
    RunsTotal,
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchPagesSuccess => "lottery_fetch_pages_success_total",
            MetricName::FetchTimeouts => "lottery_fetch_timeouts_total",
            MetricName::FetchErrors => "lottery_fetch_errors_total",
            MetricName::FetchDuration => "lottery_fetch_duration_seconds",
            MetricName::FetchPageBytes => "lottery_fetch_page_bytes",
            MetricName::ParserRowsSeen => "lottery_parser_rows_seen_total",
            MetricName::ParserRowsRejected => "lottery_parser_rows_rejected_total",
            MetricName::ScrapeRecordsAccepted => "lottery_scrape_records_accepted_total",
            MetricName::ScrapeRowsOutOfWindow => "lottery_scrape_rows_out_of_window_total",
            MetricName::ScrapeRowsKnown => "lottery_scrape_rows_known_total",
            MetricName::ScrapeStops => "lottery_scrape_stops_total",
            MetricName::StoreRowsWritten => "lottery_store_rows_written",
            MetricName::StoreNewRows => "lottery_store_new_rows_total",
            MetricName::StoreWritesSkipped => "lottery_store_writes_skipped_total",
            MetricName::RunsTotal => "lottery_runs_total",
            MetricName::RunDuration => "lottery_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Rendered text exposition of everything recorded so far
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|h| h.render())
}

/// Push the current snapshot to the configured Pushgateway, if any.
/// Failures are logged and otherwise ignored.
pub async fn push_to_gateway(instance: &str) {
    let base = match std::env::var(PUSHGATEWAY_ENV) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return,
    };
    let Some(body) = render() else {
        return;
    };
    let push_url = format!("{}/metrics/job/{}/instance/{}", base.trim_end_matches('/'), JOB_NAME, instance);

    let client = reqwest::Client::new();
    match client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => info!("Pushed metrics to Pushgateway for {}", instance),
        Ok(r) => warn!("Pushgateway responded with status {} for {}", r.status().as_u16(), instance),
        Err(e) => warn!("Failed to push metrics to Pushgateway for {}: {}", instance, e),
    }
}

// ============================================================================
// Fetch Metrics
// ============================================================================

pub mod fetch {
    use super::MetricName;

    pub fn page_success(bytes: usize, secs: f64) {
        ::metrics::counter!(MetricName::FetchPagesSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::FetchDuration.as_str()).record(secs);
        ::metrics::histogram!(MetricName::FetchPageBytes.as_str()).record(bytes as f64);
    }

    pub fn timeout() {
        ::metrics::counter!(MetricName::FetchTimeouts.as_str()).increment(1);
    }

    pub fn error(kind: &'static str) {
        ::metrics::counter!(MetricName::FetchErrors.as_str(), "kind" => kind).increment(1);
    }
}

// ============================================================================
// Parser Metrics
// ============================================================================

pub mod parser {
    use super::MetricName;

    pub fn rows_seen(count: usize) {
        ::metrics::counter!(MetricName::ParserRowsSeen.as_str()).increment(count as u64);
    }

    pub fn row_rejected(reason: &'static str) {
        ::metrics::counter!(MetricName::ParserRowsRejected.as_str(), "reason" => reason).increment(1);
    }
}

// ============================================================================
// Scrape Metrics
// ============================================================================

pub mod scrape {
    use super::MetricName;

    pub fn record_accepted() {
        ::metrics::counter!(MetricName::ScrapeRecordsAccepted.as_str()).increment(1);
    }

    pub fn row_out_of_window() {
        ::metrics::counter!(MetricName::ScrapeRowsOutOfWindow.as_str()).increment(1);
    }

    pub fn row_known() {
        ::metrics::counter!(MetricName::ScrapeRowsKnown.as_str()).increment(1);
    }

    pub fn stopped(reason: &'static str) {
        ::metrics::counter!(MetricName::ScrapeStops.as_str(), "reason" => reason).increment(1);
    }
}

// ============================================================================
// Store Metrics
// ============================================================================

pub mod store {
    use super::MetricName;

    pub fn written(total_rows: usize, new_rows: usize) {
        ::metrics::gauge!(MetricName::StoreRowsWritten.as_str()).set(total_rows as f64);
        ::metrics::counter!(MetricName::StoreNewRows.as_str()).increment(new_rows as u64);
    }

    pub fn write_skipped() {
        ::metrics::counter!(MetricName::StoreWritesSkipped.as_str()).increment(1);
    }
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use super::MetricName;

    pub fn completed(game: &'static str, stop: &'static str, duration_secs: f64) {
        ::metrics::counter!(MetricName::RunsTotal.as_str(), "game" => game, "stop" => stop).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str(), "game" => game).record(duration_secs);
    }
}
