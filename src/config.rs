use crate::common::constants::{
    CLI_DATE_FORMAT, DEFAULT_LOOKBACK_DAYS, DEFAULT_USER_AGENTS, POWERBALL_GAME,
};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{DateWindow, Game};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DATA_DIR_ENV: &str = "LOTTERY_DATA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scrape: ScrapePolicy,
    pub fetcher: FetcherConfig,
    pub store: StoreConfig,
}

/// Inclusive range of milliseconds a randomized delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// Business retry and politeness settings for one scrape pass.
///
/// Defaults: page delay 2–5 s, advance delay 2–6 s, 3 load attempts 3 s apart.
/// The delays keep the request cadence under the site's bot detection and are
/// not needed for correctness, so tests run with [`ScrapePolicy::immediate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapePolicy {
    /// Randomized wait before each page load
    pub page_delay: DelayRange,
    /// Randomized wait before moving on to the next page
    pub advance_delay: DelayRange,
    /// Fixed wait between timed-out load attempts
    pub retry_delay_ms: u64,
    /// Total attempts per page when the load times out
    pub max_load_attempts: u32,
    /// Upper bound on pages visited in one pass (unbounded when unset)
    pub max_pages: Option<u32>,
    /// Stop once a whole page of draws predates the window start
    pub stop_when_past_window: bool,
    /// Stop at the first page whose in-window draws are all already stored
    pub stop_when_up_to_date: bool,
}

impl Default for ScrapePolicy {
    fn default() -> Self {
        Self {
            page_delay: DelayRange::new(2_000, 5_000),
            advance_delay: DelayRange::new(2_000, 6_000),
            retry_delay_ms: 3_000,
            max_load_attempts: 3,
            max_pages: None,
            stop_when_past_window: true,
            stop_when_up_to_date: true,
        }
    }
}

impl ScrapePolicy {
    /// Same retry semantics with every delay removed
    pub fn immediate() -> Self {
        Self {
            page_delay: DelayRange::ZERO,
            advance_delay: DelayRange::ZERO,
            retry_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    /// Plain HTTP GET with rotated user agents
    #[default]
    Http,
    /// Headless Chrome (requires the `browser` feature)
    Browser,
}

/// Transport settings; identity rotation lives here, retries do not
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub kind: FetcherKind,
    /// Page-load timeout in seconds; the site can be very slow
    pub page_load_timeout_secs: u64,
    pub headless: bool,
    pub user_agents: Vec<String>,
    /// Browser window width range, in pixels
    pub window_width: (u32, u32),
    /// Browser window height range, in pixels
    pub window_height: (u32, u32),
    pub chrome_executable: Option<PathBuf>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            kind: FetcherKind::Http,
            page_load_timeout_secs: 300,
            headless: true,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            window_width: (1000, 1600),
            window_height: (700, 900),
            chrome_executable: None,
        }
    }
}

impl FetcherConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn random_user_agent<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        if self.user_agents.is_empty() {
            return DEFAULT_USER_AGENTS[0];
        }
        &self.user_agents[rng.gen_range(0..self.user_agents.len())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `config.toml` when it exists.
    ///
    /// An explicitly requested file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.store.data_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scrape;
        for (name, range) in [("page_delay", s.page_delay), ("advance_delay", s.advance_delay)] {
            if range.min_ms > range.max_ms {
                return Err(ScraperError::Config(format!(
                    "scrape.{name}: min_ms ({}) exceeds max_ms ({})",
                    range.min_ms, range.max_ms
                )));
            }
        }
        if s.max_load_attempts == 0 {
            return Err(ScraperError::Config("scrape.max_load_attempts must be at least 1".into()));
        }
        let f = &self.fetcher;
        if f.window_width.0 > f.window_width.1 || f.window_height.0 > f.window_height.1 {
            return Err(ScraperError::Config("fetcher window size ranges must be ordered (min, max)".into()));
        }
        Ok(())
    }
}

/// Game and date window for one run, resolved from loosely-typed user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub game: Game,
    pub window: DateWindow,
}

impl RunRequest {
    /// Unknown games fall back to Powerball. Dates that do not parse as
    /// `YYYY-MM-DD` fall back to the trailing 365 days ending `today`;
    /// reversed bounds are swapped.
    pub fn resolve(game: Option<&str>, start: Option<&str>, end: Option<&str>, today: NaiveDate) -> Self {
        let game = match game.map(|g| (g, Game::from_name(g))) {
            Some((_, Some(game))) => game,
            Some((raw, None)) => {
                warn!("Invalid game '{}', defaulting to {}", raw, POWERBALL_GAME);
                Game::Powerball
            }
            None => Game::Powerball,
        };

        let parse = |s: Option<&str>| s.and_then(|s| NaiveDate::parse_from_str(s.trim(), CLI_DATE_FORMAT).ok());
        let window = match (parse(start), parse(end)) {
            (Some(start), Some(end)) => {
                if start > end {
                    warn!("Swapping start/end because start > end");
                }
                DateWindow::new(start, end)
            }
            _ => {
                if start.is_some() || end.is_some() {
                    warn!("Invalid date input, defaulting to last {} days", DEFAULT_LOOKBACK_DAYS);
                }
                DateWindow::trailing_days(today, DEFAULT_LOOKBACK_DAYS)
            }
        };

        Self { game, window }
    }
}
