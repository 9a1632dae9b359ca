use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::app::ports::{DrawStore, PageFetcher};
use crate::common::error::Result;
use crate::common::types::{DateWindow, Game, GameConfig, KnownDateSet};
use crate::config::ScrapePolicy;
use crate::observability::metrics;
use crate::scrape::{ScrapeController, StopReason};
use crate::store::merge;

/// Result of one update run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub game: Game,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub store: String,
    pub stop: StopReason,
    pub pages_visited: u32,
    /// Draws accepted by the scrape pass
    pub scraped: usize,
    pub new_rows: usize,
    pub updated_rows: usize,
    pub dropped_rows: usize,
    /// Rows in the store after the run
    pub total_rows: usize,
    /// Whether the store file was rewritten
    pub written: bool,
    pub duration_secs: f64,
}

pub struct Pipeline;

impl Pipeline {
    /// Bring `store` up to date with the draws published inside `window`.
    ///
    /// The fetcher session is closed once scraping ends, whatever the outcome.
    /// An unreadable store fails the run before any page is requested.
    pub async fn run_update(
        game: &GameConfig,
        window: DateWindow,
        store: &dyn DrawStore,
        fetcher: &mut dyn PageFetcher,
        policy: ScrapePolicy,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("update", run_id = %run_id, game = %game.display_name);
        Self::run_inner(run_id, game, window, store, fetcher, policy)
            .instrument(span)
            .await
    }

    async fn run_inner(
        run_id: Uuid,
        game: &GameConfig,
        window: DateWindow,
        store: &dyn DrawStore,
        fetcher: &mut dyn PageFetcher,
        policy: ScrapePolicy,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        info!("Updating {} draws for {} into {}", game.display_name, window, store.location());

        let existing = match store.load() {
            Ok(rows) => rows,
            Err(e) => {
                close_fetcher(fetcher).await;
                return Err(e);
            }
        };
        let known = KnownDateSet::from_rows(&existing);
        info!("Store holds {} rows ({} distinct dates)", existing.len(), known.len());

        let outcome = ScrapeController::new(&mut *fetcher, policy)
            .scrape(game, window, &known)
            .await;
        close_fetcher(fetcher).await;

        if outcome.stop.is_early() {
            warn!("Scrape ended early: {}", outcome.stop);
        } else {
            info!("Scrape finished: {}", outcome.stop);
        }

        let scraped = outcome.records.len();
        let merged = merge(existing, &outcome.records);
        if merged.dropped_rows > 0 {
            warn!("Dropped {} stored rows with unreadable dates", merged.dropped_rows);
        }

        let written = merged.has_changes();
        if written {
            store.replace(&merged.dataset)?;
            metrics::store::written(merged.dataset.len(), merged.new_rows);
            info!(
                "Saved {} rows ({} new, {} updated) to {}",
                merged.dataset.len(),
                merged.new_rows,
                merged.updated_rows,
                store.location()
            );
        } else {
            metrics::store::write_skipped();
            info!("No new records found");
        }

        let duration_secs = started.elapsed().as_secs_f64();
        metrics::run::completed(game.display_name, outcome.stop.kind(), duration_secs);

        Ok(RunSummary {
            run_id,
            game: game.game,
            window_start: window.start(),
            window_end: window.end(),
            store: store.location(),
            stop: outcome.stop,
            pages_visited: outcome.pages_visited,
            scraped,
            new_rows: merged.new_rows,
            updated_rows: merged.updated_rows,
            dropped_rows: merged.dropped_rows,
            total_rows: merged.dataset.len(),
            written,
            duration_secs,
        })
    }
}

async fn close_fetcher(fetcher: &mut dyn PageFetcher) {
    if let Err(e) = fetcher.close().await {
        warn!("Failed to close fetcher session: {}", e);
    }
}
