//! Results-page parser.
//!
//! Turns one rendered results page into raw rows and validated draw records.
//! Malformed rows are dropped with a [`RowRejection`]; nothing here fails the
//! page. Date-window and known-date filtering happen in the controller.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use tracing::debug;

use crate::common::constants::BLOCK_MARKERS;
use crate::common::types::{DrawRecord, Game, GameConfig};
use crate::observability::metrics;

static POWERBALL_ROWS: Lazy<Selector> = Lazy::new(|| selector(crate::common::constants::POWERBALL_ROW_SELECTOR));
static MEGA_MILLIONS_ROWS: Lazy<Selector> =
    Lazy::new(|| selector(crate::common::constants::MEGA_MILLIONS_ROW_SELECTOR));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static SECTION: Lazy<Selector> = Lazy::new(|| selector("section.results"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static BALL_LIST: Lazy<Selector> = Lazy::new(|| selector("ul"));
static BALL: Lazy<Selector> = Lazy::new(|| selector("li"));
static BUTTON_LINK: Lazy<Selector> = Lazy::new(|| selector("a.button"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

fn row_selector(game: Game) -> &'static Selector {
    match game {
        Game::Powerball => &POWERBALL_ROWS,
        Game::MegaMillions => &MEGA_MILLIONS_ROWS,
    }
}

/// Role of one `li` in a draw's ball list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallRole {
    Plain,
    Bonus,
    /// Power Play / Megaplier; not part of the draw
    Multiplier,
}

impl BallRole {
    fn from_classes<'a>(classes: impl Iterator<Item = &'a str>) -> Self {
        let mut role = BallRole::Plain;
        for class in classes {
            match class {
                "bonus" => return BallRole::Bonus,
                "multiplier" => role = BallRole::Multiplier,
                _ => {}
            }
        }
        role
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedBall {
    pub role: BallRole,
    pub value: String,
}

/// One table row as it appears on the page, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// e.g. "Wed, March, 19, 2025"
    pub date_text: String,
    pub balls: Vec<TaggedBall>,
    pub jackpot_text: String,
}

/// Why a row was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    MissingCells(usize),
    MissingSection,
    MissingDate,
    MissingBallList,
    DateComponents(String),
    InvalidDate(String),
    PlainBallCount(usize),
    BonusBallCount(usize),
    NonNumericBall(String),
}

impl RowRejection {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RowRejection::MissingCells(_) => "missing_cells",
            RowRejection::MissingSection => "missing_section",
            RowRejection::MissingDate => "missing_date",
            RowRejection::MissingBallList => "missing_ball_list",
            RowRejection::DateComponents(_) => "date_components",
            RowRejection::InvalidDate(_) => "invalid_date",
            RowRejection::PlainBallCount(_) => "plain_ball_count",
            RowRejection::BonusBallCount(_) => "bonus_ball_count",
            RowRejection::NonNumericBall(_) => "non_numeric_ball",
        }
    }
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRejection::MissingCells(n) => write!(f, "expected at least 2 cells, found {n}"),
            RowRejection::MissingSection => f.write_str("no results section"),
            RowRejection::MissingDate => f.write_str("no date link"),
            RowRejection::MissingBallList => f.write_str("no ball list"),
            RowRejection::DateComponents(t) => write!(f, "date text {t:?} has too few components"),
            RowRejection::InvalidDate(t) => write!(f, "date text {t:?} is not a calendar date"),
            RowRejection::PlainBallCount(n) => write!(f, "expected 5 plain balls, found {n}"),
            RowRejection::BonusBallCount(n) => write!(f, "expected 1 bonus ball, found {n}"),
            RowRejection::NonNumericBall(v) => write!(f, "ball value {v:?} is not numeric"),
        }
    }
}

impl RawRow {
    /// Validate the row into a draw record.
    pub fn into_record(self) -> Result<DrawRecord, RowRejection> {
        let draw_date = parse_draw_date(&self.date_text)?;

        let mut plain = Vec::with_capacity(5);
        let mut bonus = Vec::with_capacity(1);
        for ball in self.balls {
            match ball.role {
                BallRole::Plain => plain.push(ball.value),
                BallRole::Bonus => bonus.push(ball.value),
                BallRole::Multiplier => {}
            }
        }
        if bonus.len() != 1 {
            return Err(RowRejection::BonusBallCount(bonus.len()));
        }
        let white_balls: [String; 5] = plain
            .try_into()
            .map_err(|v: Vec<String>| RowRejection::PlainBallCount(v.len()))?;
        let special_ball = bonus.remove(0);

        if let Some(bad) = white_balls.iter().chain(std::iter::once(&special_ball)).find(|v| !is_numeric(v)) {
            return Err(RowRejection::NonNumericBall(bad.clone()));
        }

        Ok(DrawRecord {
            draw_date,
            white_balls,
            special_ball,
            jackpot: self.jackpot_text,
        })
    }
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Parse the site's date phrase, e.g. "Wed, March, 19, 2025".
///
/// The weekday component is ignored; month name, day and year must follow.
pub fn parse_draw_date(date_text: &str) -> Result<NaiveDate, RowRejection> {
    let parts: Vec<&str> = date_text.split(',').map(str::trim).collect();
    if parts.len() < 4 {
        return Err(RowRejection::DateComponents(date_text.to_string()));
    }
    let joined = format!("{} {} {}", parts[1], parts[2], parts[3]);
    NaiveDate::parse_from_str(&joined, "%B %d %Y").map_err(|_| RowRejection::InvalidDate(date_text.to_string()))
}

/// Result of parsing one page
#[derive(Debug, Clone, Default)]
pub struct PageParse {
    /// Table rows matched on the page, valid or not
    pub rows_seen: usize,
    /// Structurally valid draws in document order
    pub records: Vec<DrawRecord>,
    pub rejected: Vec<RowRejection>,
}

/// Extract every results row on the page, in document order.
///
/// Rows missing the cells the site always renders come back as rejections so
/// the caller can still count them.
pub fn extract_rows(html: &str, game: &GameConfig) -> Vec<Result<RawRow, RowRejection>> {
    let document = Html::parse_document(html);
    document.select(row_selector(game.game)).map(extract_row).collect()
}

fn extract_row(tr: ElementRef<'_>) -> Result<RawRow, RowRejection> {
    let cells: Vec<ElementRef<'_>> = tr.select(&CELL).collect();
    if cells.len() < 2 {
        return Err(RowRejection::MissingCells(cells.len()));
    }

    let section = cells[0].select(&SECTION).next().ok_or(RowRejection::MissingSection)?;
    let date_text = section
        .select(&ANCHOR)
        .next()
        .map(element_text)
        .ok_or(RowRejection::MissingDate)?;
    let list = section.select(&BALL_LIST).next().ok_or(RowRejection::MissingBallList)?;

    let balls = list
        .select(&BALL)
        .map(|li| TaggedBall {
            role: BallRole::from_classes(li.value().classes()),
            value: element_text(li),
        })
        .collect();

    // Jackpot is best effort: a missing link is an empty jackpot, not a bad row
    let jackpot_text = cells[1].select(&ANCHOR).next().map(element_text).unwrap_or_default();

    Ok(RawRow {
        date_text,
        balls,
        jackpot_text,
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    let text: String = el.text().collect();
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Parse a page into validated draw records.
pub fn parse_page(html: &str, game: &GameConfig) -> PageParse {
    let mut parse = PageParse::default();
    for row in extract_rows(html, game) {
        parse.rows_seen += 1;
        match row.and_then(RawRow::into_record) {
            Ok(record) => parse.records.push(record),
            Err(rejection) => {
                debug!(reason = %rejection, "Dropping malformed row");
                metrics::parser::row_rejected(rejection.kind());
                parse.rejected.push(rejection);
            }
        }
    }
    metrics::parser::rows_seen(parse.rows_seen);
    parse
}

/// Whether the page links to results page `next_page`
pub fn has_next_page(html: &str, game: &GameConfig, next_page: u32) -> bool {
    let href = game.next_page_href(next_page);
    Html::parse_document(html)
        .select(&BUTTON_LINK)
        .any(|a| a.value().attr("href") == Some(href.as_str()))
}

/// First blocking signature found in the raw HTML, if any
pub fn find_block_marker(html: &str) -> Option<&'static str> {
    BLOCK_MARKERS.iter().copied().find(|marker| html.contains(marker))
}
