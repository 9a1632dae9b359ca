//! Pagination driver for one scrape pass.
//!
//! The controller walks results pages `1, 2, ...` through a small state
//! machine (`Loading -> Parsing -> Advancing -> Loading ...`) until it reaches
//! `Stopped`. Every stop is an expected end of run: the accumulated records are
//! always returned and nothing here is surfaced as an error.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::app::ports::PageFetcher;
use crate::common::error::FetchError;
use crate::common::types::{DateWindow, DrawRecord, GameConfig, KnownDateSet};
use crate::config::ScrapePolicy;
use crate::observability::metrics;
use crate::scrape::parser;

/// Why a scrape pass ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The page could not be loaded (retries exhausted or navigation error)
    LoadFailure { page: u32, detail: String },
    /// The site answered with a denial / challenge page
    Blocked { page: u32, marker: String },
    /// The page had no results rows at all
    NoRows { page: u32 },
    /// Rows were present but none could be parsed into a draw
    NoValidRows { page: u32 },
    /// Every draw on the page predates the requested window
    PastWindow { page: u32 },
    /// The page's in-window draws were all already stored
    UpToDate { page: u32 },
    /// The configured page cap was reached
    PageLimit { page: u32 },
    /// No link to the next page. `possibly_truncated` is set when the
    /// listing ended before any draw on or before the window start was seen,
    /// which is also what a broken next-page selector looks like.
    EndOfResults { page: u32, possibly_truncated: bool },
}

impl StopReason {
    pub fn kind(&self) -> &'static str {
        match self {
            StopReason::LoadFailure { .. } => "load_failure",
            StopReason::Blocked { .. } => "blocked",
            StopReason::NoRows { .. } => "no_rows",
            StopReason::NoValidRows { .. } => "no_valid_rows",
            StopReason::PastWindow { .. } => "past_window",
            StopReason::UpToDate { .. } => "up_to_date",
            StopReason::PageLimit { .. } => "page_limit",
            StopReason::EndOfResults { .. } => "end_of_results",
        }
    }

    /// Whether the run ended before the archive was exhausted for the window
    pub fn is_early(&self) -> bool {
        matches!(
            self,
            StopReason::LoadFailure { .. }
                | StopReason::Blocked { .. }
                | StopReason::NoValidRows { .. }
                | StopReason::PageLimit { .. }
                | StopReason::EndOfResults { possibly_truncated: true, .. }
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::LoadFailure { page, detail } => write!(f, "could not load page {page}: {detail}"),
            StopReason::Blocked { page, marker } => write!(f, "blocked by site on page {page} ({marker})"),
            StopReason::NoRows { page } => write!(f, "no rows found on page {page}"),
            StopReason::NoValidRows { page } => write!(f, "no valid draws on page {page}"),
            StopReason::PastWindow { page } => write!(f, "page {page} is entirely older than the requested range"),
            StopReason::UpToDate { page } => write!(f, "page {page} holds only draws already on file"),
            StopReason::PageLimit { page } => write!(f, "page limit reached at page {page}"),
            StopReason::EndOfResults { page, possibly_truncated: false } => {
                write!(f, "no next page link after page {page}")
            }
            StopReason::EndOfResults { page, possibly_truncated: true } => write!(
                f,
                "no next page link after page {page} before reaching the start of the range (results may be truncated)"
            ),
        }
    }
}

#[derive(Debug)]
enum ScrapeState {
    Loading { page: u32 },
    Parsing { page: u32, html: String },
    Advancing { page: u32, html: String },
    Stopped(StopReason),
}

/// Records gathered by one pass and how it ended
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub records: Vec<DrawRecord>,
    pub stop: StopReason,
    pub pages_visited: u32,
}

pub struct ScrapeController<'f, F: PageFetcher + ?Sized> {
    fetcher: &'f mut F,
    policy: ScrapePolicy,
    rng: StdRng,
}

impl<'f, F: PageFetcher + ?Sized> ScrapeController<'f, F> {
    pub fn new(fetcher: &'f mut F, policy: ScrapePolicy) -> Self {
        Self {
            fetcher,
            policy,
            rng: StdRng::from_entropy(),
        }
    }

    /// Scrape draws inside `window` whose dates are not in `known`.
    #[instrument(skip(self, game, window, known), fields(game = %game.display_name, window = %window))]
    pub async fn scrape(&mut self, game: &GameConfig, window: DateWindow, known: &KnownDateSet) -> ScrapeOutcome {
        let mut pass = Pass {
            records: Vec::new(),
            accepted: HashSet::new(),
            oldest_seen: None,
            pages_visited: 0,
        };
        let mut state = ScrapeState::Loading { page: 1 };

        loop {
            state = match state {
                ScrapeState::Loading { page } => self.load(game, page).await,
                ScrapeState::Parsing { page, html } => {
                    pass.pages_visited += 1;
                    self.parse(game, window, known, page, html, &mut pass)
                }
                ScrapeState::Advancing { page, html } => self.advance(game, window, page, &html, &pass).await,
                ScrapeState::Stopped(stop) => {
                    metrics::scrape::stopped(stop.kind());
                    if stop.is_early() {
                        warn!("Stopped scraping: {}", stop);
                    } else {
                        info!("Done scraping: {}", stop);
                    }
                    return ScrapeOutcome {
                        records: pass.records,
                        stop,
                        pages_visited: pass.pages_visited,
                    };
                }
            };
        }
    }

    async fn load(&mut self, game: &GameConfig, page: u32) -> ScrapeState {
        let url = game.page_url(page);
        let delay = self.policy.page_delay.sample(&mut self.rng);
        self.pause(delay).await;

        let attempts = self.policy.max_load_attempts.max(1);
        for attempt in 1..=attempts {
            info!("Loading page: {} (attempt {}/{})", url, attempt, attempts);
            let started = Instant::now();
            match self.fetcher.fetch_page(&url).await {
                Ok(html) => {
                    metrics::fetch::page_success(html.len(), started.elapsed().as_secs_f64());
                    if let Some(marker) = parser::find_block_marker(&html) {
                        return ScrapeState::Stopped(StopReason::Blocked {
                            page,
                            marker: marker.to_string(),
                        });
                    }
                    return ScrapeState::Parsing { page, html };
                }
                Err(FetchError::Timeout) => {
                    metrics::fetch::timeout();
                    warn!("Timeout on page {}, attempt {}", url, attempt);
                    if attempt < attempts {
                        self.pause(self.policy.retry_delay()).await;
                    }
                }
                Err(FetchError::Blocked(detail)) => {
                    metrics::fetch::error("blocked");
                    return ScrapeState::Stopped(StopReason::Blocked { page, marker: detail });
                }
                Err(FetchError::Navigation(detail)) => {
                    metrics::fetch::error("navigation");
                    return ScrapeState::Stopped(StopReason::LoadFailure { page, detail });
                }
            }
        }

        ScrapeState::Stopped(StopReason::LoadFailure {
            page,
            detail: format!("timed out after {} attempts", attempts),
        })
    }

    fn parse(
        &self,
        game: &GameConfig,
        window: DateWindow,
        known: &KnownDateSet,
        page: u32,
        html: String,
        pass: &mut Pass,
    ) -> ScrapeState {
        let parsed = parser::parse_page(&html, game);
        if parsed.rows_seen == 0 {
            return ScrapeState::Stopped(StopReason::NoRows { page });
        }
        if parsed.records.is_empty() {
            return ScrapeState::Stopped(StopReason::NoValidRows { page });
        }

        let before = pass.records.len();
        let mut known_on_page = 0;
        let mut newest_on_page: Option<NaiveDate> = None;
        for record in parsed.records {
            let date = record.draw_date;
            newest_on_page = newest_on_page.max(Some(date));
            pass.oldest_seen = Some(pass.oldest_seen.map_or(date, |d| d.min(date)));

            if !window.contains(date) {
                metrics::scrape::row_out_of_window();
                continue;
            }
            if known.contains_date(date) {
                metrics::scrape::row_known();
                known_on_page += 1;
                continue;
            }
            // Page boundaries shift when a draw is published mid-run
            if !pass.accepted.insert(date) {
                debug!("Draw {} already collected on an earlier page", date);
                continue;
            }
            metrics::scrape::record_accepted();
            pass.records.push(record);
        }
        let added = pass.records.len() - before;
        info!(
            "Page {}: {} rows, {} rejected, {} known, {} new draws",
            page,
            parsed.rows_seen,
            parsed.rejected.len(),
            known_on_page,
            added
        );

        if self.policy.stop_when_past_window && newest_on_page.map_or(false, |d| d < window.start()) {
            return ScrapeState::Stopped(StopReason::PastWindow { page });
        }
        // Listing is newest first, so older pages are on file too
        if self.policy.stop_when_up_to_date && added == 0 && known_on_page > 0 {
            return ScrapeState::Stopped(StopReason::UpToDate { page });
        }
        ScrapeState::Advancing { page, html }
    }

    async fn advance(&mut self, game: &GameConfig, window: DateWindow, page: u32, html: &str, pass: &Pass) -> ScrapeState {
        if !parser::has_next_page(html, game, page + 1) {
            let possibly_truncated = pass.oldest_seen.map_or(true, |d| d > window.start());
            return ScrapeState::Stopped(StopReason::EndOfResults { page, possibly_truncated });
        }
        if self.policy.max_pages.map_or(false, |max| page >= max) {
            return ScrapeState::Stopped(StopReason::PageLimit { page });
        }
        let delay = self.policy.advance_delay.sample(&mut self.rng);
        self.pause(delay).await;
        ScrapeState::Loading { page: page + 1 }
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            debug!("Sleeping {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

struct Pass {
    records: Vec<DrawRecord>,
    accepted: HashSet<NaiveDate>,
    oldest_seen: Option<NaiveDate>,
    pages_visited: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Game;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};

    /// Serves scripted responses per URL and records every request
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: HashMap<String, VecDeque<Result<String, FetchError>>>,
        requests: Vec<String>,
    }

    impl ScriptedFetcher {
        fn respond(&mut self, url: &str, response: Result<String, FetchError>) {
            self.responses.entry(url.to_string()).or_default().push_back(response);
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&mut self, url: &str) -> Result<String, FetchError> {
            self.requests.push(url.to_string());
            self.responses
                .get_mut(url)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Err(FetchError::Navigation(format!("unscripted url {url}"))))
        }
    }

    fn draw_row(date_text: &str, first_ball: u32) -> String {
        format!(
            r#"<tr><td><section class="results"><a href="/d">{date_text}</a><ul><li>{first_ball}</li><li>20</li><li>30</li><li>40</li><li>50</li><li class="bonus">7</li></ul></section></td><td><a href="/j">$20 Million</a></td></tr>"#
        )
    }

    fn results_page(rows: &[String], next_page: Option<u32>) -> String {
        let next = next_page
            .map(|p| format!(r#"<a class="button" href="/powerball/results/{p}">Next</a>"#))
            .unwrap_or_default();
        format!(
            r#"<html><body><table class="results pb"><tbody>{}</tbody></table>{next}</body></html>"#,
            rows.join("")
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window_2025() -> DateWindow {
        DateWindow::new(date(2025, 1, 1), date(2025, 12, 31))
    }

    fn url(page: u32) -> String {
        Game::Powerball.config().page_url(page)
    }

    async fn run(fetcher: &mut ScriptedFetcher, window: DateWindow, known: &KnownDateSet) -> ScrapeOutcome {
        let game = Game::Powerball.config();
        ScrapeController::new(fetcher, ScrapePolicy::immediate())
            .scrape(&game, window, known)
            .await
    }

    #[tokio::test]
    async fn test_paginates_until_no_next_link() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(2))));
        fetcher.respond(&url(2), Ok(results_page(&[draw_row("Sat, March, 15, 2025", 2)], None)));

        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.pages_visited, 2);
        assert_eq!(outcome.stop, StopReason::EndOfResults { page: 2, possibly_truncated: true });
        assert_eq!(fetcher.requests, vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn test_filters_window_and_known_dates() {
        let mut fetcher = ScriptedFetcher::default();
        let rows = vec![
            draw_row("Wed, January, 1, 2026", 1),
            draw_row("Wed, March, 19, 2025", 2),
            draw_row("Sat, March, 15, 2025", 3),
            draw_row("Wed, December, 31, 2024", 4),
        ];
        fetcher.respond(&url(1), Ok(results_page(&rows, None)));
        let known: KnownDateSet = vec!["03/15/2025".to_string()].into_iter().collect();

        let outcome = run(&mut fetcher, window_2025(), &known).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].draw_date, date(2025, 3, 19));
        for record in &outcome.records {
            assert!(window_2025().contains(record.draw_date));
            assert!(!known.contains_date(record.draw_date));
        }
        assert_eq!(outcome.stop, StopReason::EndOfResults { page: 1, possibly_truncated: false });
    }

    #[tokio::test]
    async fn test_three_timeouts_stop_and_keep_prior_pages() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(2))));
        for _ in 0..3 {
            fetcher.respond(&url(2), Err(FetchError::Timeout));
        }

        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;

        assert_eq!(outcome.records.len(), 1);
        assert!(matches!(outcome.stop, StopReason::LoadFailure { page: 2, .. }));
        assert_eq!(fetcher.requests, vec![url(1), url(2), url(2), url(2)]);
    }

    #[tokio::test]
    async fn test_timeout_then_success_continues() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Err(FetchError::Timeout));
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], None)));

        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(fetcher.requests.len(), 2);
    }

    #[tokio::test]
    async fn test_navigation_error_is_not_retried() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Err(FetchError::Navigation("dns failure".into())));

        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;

        assert!(outcome.records.is_empty());
        assert_eq!(
            outcome.stop,
            StopReason::LoadFailure { page: 1, detail: "dns failure".into() }
        );
        assert_eq!(fetcher.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_block_marker_stops_without_further_pages() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(2))));
        fetcher.respond(&url(2), Ok("<html><body><div id=\"cf-error-details\">Sorry</div></body></html>".into()));
        fetcher.respond(&url(3), Ok(results_page(&[draw_row("Sat, March, 8, 2025", 1)], None)));

        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.stop,
            StopReason::Blocked { page: 2, marker: "cf-error-details".into() }
        );
        assert_eq!(fetcher.requests, vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn test_no_rows_and_no_valid_rows() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[], Some(2))));
        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;
        assert_eq!(outcome.stop, StopReason::NoRows { page: 1 });

        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("someday", 1)], Some(2))));
        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;
        assert_eq!(outcome.stop, StopReason::NoValidRows { page: 1 });
        assert_eq!(fetcher.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_future_window_stops_after_first_page() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(2))));
        let window = DateWindow::new(date(2030, 1, 1), date(2030, 12, 31));

        let outcome = run(&mut fetcher, window, &KnownDateSet::default()).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stop, StopReason::PastWindow { page: 1 });
    }

    fn three_known_pages(fetcher: &mut ScriptedFetcher) -> KnownDateSet {
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Sat, March, 22, 2025", 1)], Some(2))));
        fetcher.respond(&url(2), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(3))));
        fetcher.respond(&url(3), Ok(results_page(&[draw_row("Sat, March, 15, 2025", 1)], Some(4))));
        vec!["03/22/2025", "03/19/2025", "03/15/2025"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_up_to_date_store_costs_one_page() {
        let mut fetcher = ScriptedFetcher::default();
        let known = three_known_pages(&mut fetcher);
        let window = DateWindow::new(date(2025, 3, 1), date(2025, 3, 31));

        let outcome = run(&mut fetcher, window, &known).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stop, StopReason::UpToDate { page: 1 });
        assert!(!outcome.stop.is_early());
        assert_eq!(fetcher.requests, vec![url(1)]);
    }

    #[tokio::test]
    async fn test_exhaustive_mode_walks_past_known_pages() {
        let mut fetcher = ScriptedFetcher::default();
        let known = three_known_pages(&mut fetcher);
        let mut policy = ScrapePolicy::immediate();
        policy.stop_when_up_to_date = false;

        let outcome = ScrapeController::new(&mut fetcher, policy)
            .scrape(&Game::Powerball.config(), DateWindow::new(date(2025, 3, 1), date(2025, 3, 31)), &known)
            .await;

        assert!(outcome.records.is_empty());
        assert_eq!(fetcher.requests, vec![url(1), url(2), url(3), url(4)]);
    }

    #[tokio::test]
    async fn test_pages_newer_than_window_keep_paginating() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Sat, March, 22, 2025", 1)], Some(2))));
        fetcher.respond(&url(2), Ok(results_page(&[draw_row("Sat, February, 15, 2025", 2)], None)));
        let known: KnownDateSet = vec!["03/22/2025".to_string()].into_iter().collect();
        let window = DateWindow::new(date(2025, 2, 1), date(2025, 2, 28));

        let outcome = run(&mut fetcher, window, &known).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].draw_date, date(2025, 2, 15));
    }

    #[tokio::test]
    async fn test_duplicate_date_across_pages_kept_once() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(2))));
        fetcher.respond(&url(2), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 9)], None)));

        let outcome = run(&mut fetcher, window_2025(), &KnownDateSet::default()).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].white_balls[0], "1");
    }

    #[tokio::test]
    async fn test_page_limit() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], Some(2))));
        let mut policy = ScrapePolicy::immediate();
        policy.max_pages = Some(1);

        let outcome = ScrapeController::new(&mut fetcher, policy)
            .scrape(&Game::Powerball.config(), window_2025(), &KnownDateSet::default())
            .await;

        assert_eq!(outcome.stop, StopReason::PageLimit { page: 1 });
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_last_page_at_limit_is_end_of_results() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.respond(&url(1), Ok(results_page(&[draw_row("Wed, March, 19, 2025", 1)], None)));
        let mut policy = ScrapePolicy::immediate();
        policy.max_pages = Some(1);

        let outcome = ScrapeController::new(&mut fetcher, policy)
            .scrape(&Game::Powerball.config(), window_2025(), &KnownDateSet::default())
            .await;

        assert!(matches!(outcome.stop, StopReason::EndOfResults { page: 1, .. }));
    }

    #[test]
    fn test_stop_reason_display() {
        let stop = StopReason::EndOfResults { page: 4, possibly_truncated: true };
        assert!(stop.to_string().contains("may be truncated"));
        assert!(stop.is_early());
        assert!(!StopReason::PastWindow { page: 2 }.is_early());
    }
}
