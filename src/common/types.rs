use crate::common::constants::*;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The two supported lottery games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Powerball,
    MegaMillions,
}

impl Game {
    /// Parse a user-supplied game name. Case, spaces, dashes and underscores are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let cleaned: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match cleaned.as_str() {
            POWERBALL_GAME => Some(Game::Powerball),
            MEGA_MILLIONS_GAME => Some(Game::MegaMillions),
            _ => None,
        }
    }

    pub fn config(&self) -> GameConfig {
        match self {
            Game::Powerball => GameConfig {
                game: *self,
                display_name: POWERBALL_DISPLAY_NAME,
                base_url: POWERBALL_BASE_URL.to_string(),
                next_href_prefix: POWERBALL_NEXT_HREF_PREFIX,
                special_column: POWERBALL_SPECIAL_COLUMN,
                csv_file: POWERBALL_CSV_FILE,
            },
            Game::MegaMillions => GameConfig {
                game: *self,
                display_name: MEGA_MILLIONS_DISPLAY_NAME,
                base_url: MEGA_MILLIONS_BASE_URL.to_string(),
                next_href_prefix: MEGA_MILLIONS_NEXT_HREF_PREFIX,
                special_column: MEGA_MILLIONS_SPECIAL_COLUMN,
                csv_file: MEGA_MILLIONS_CSV_FILE,
            },
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().display_name)
    }
}

/// Per-game site and store settings
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub game: Game,
    pub display_name: &'static str,
    /// Results listing URL; the page number is appended to it
    pub base_url: String,
    pub next_href_prefix: &'static str,
    /// Column name of the special ball ("Powerball" or "MegaBall")
    pub special_column: &'static str,
    pub csv_file: &'static str,
}

impl GameConfig {
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}", self.base_url, page)
    }

    pub fn next_page_href(&self, page: u32) -> String {
        format!("{}{}", self.next_href_prefix, page)
    }

    /// Fixed column schema of the persisted table
    pub fn columns(&self) -> [&'static str; 4] {
        [DRAW_DATE_COLUMN, WHITE_BALLS_COLUMN, self.special_column, JACKPOT_COLUMN]
    }
}

/// One draw as scraped from the results site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub draw_date: NaiveDate,
    pub white_balls: [String; 5],
    pub special_ball: String,
    pub jackpot: String,
}

impl DrawRecord {
    /// Draw date in the `MM/DD/YYYY` form used by the store
    pub fn date_key(&self) -> String {
        self.draw_date.format(STORE_DATE_FORMAT).to_string()
    }

    pub fn to_row(&self) -> DrawRow {
        DrawRow {
            draw_date: self.date_key(),
            white_balls: self.white_balls.join(" "),
            special_ball: self.special_ball.clone(),
            jackpot: self.jackpot.clone(),
        }
    }
}

/// One row of the persisted table, kept as text so unreadable rows survive loading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRow {
    pub draw_date: String,
    pub white_balls: String,
    pub special_ball: String,
    pub jackpot: String,
}

impl DrawRow {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.draw_date.trim(), STORE_DATE_FORMAT).ok()
    }
}

/// Inclusive date range of draws to harvest. Only built through [`DateWindow::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Builds a window, swapping the bounds when they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// The `days` days ending on `today`
    pub fn trailing_days(today: NaiveDate, days: i64) -> Self {
        Self::new(today - Duration::days(days), today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Draw dates (`MM/DD/YYYY`) already present in the store
#[derive(Debug, Clone, Default)]
pub struct KnownDateSet {
    dates: HashSet<String>,
}

impl KnownDateSet {
    pub fn from_rows(rows: &[DrawRow]) -> Self {
        rows.iter().map(|r| r.draw_date.clone()).collect()
    }

    pub fn contains(&self, date_key: &str) -> bool {
        self.dates.contains(date_key)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(&date.format(STORE_DATE_FORMAT).to_string())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<String> for KnownDateSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().filter(|d| !d.trim().is_empty()).collect(),
        }
    }
}
