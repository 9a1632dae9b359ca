/// Game name constants to ensure consistency across the codebase.
/// These define the mapping between CLI game names and per-game site/store settings.

// User-friendly game names (used in CLI)
pub const POWERBALL_GAME: &str = "powerball";
pub const MEGA_MILLIONS_GAME: &str = "megamillions";

// Display names (used in logs and summaries)
pub const POWERBALL_DISPLAY_NAME: &str = "Powerball";
pub const MEGA_MILLIONS_DISPLAY_NAME: &str = "Megamillions";

// Results site
pub const POWERBALL_BASE_URL: &str = "https://www.usamega.com/powerball/results/";
pub const MEGA_MILLIONS_BASE_URL: &str = "https://www.usamega.com/mega-millions/results/";

pub const POWERBALL_ROW_SELECTOR: &str = "table.results.pb tbody tr";
pub const MEGA_MILLIONS_ROW_SELECTOR: &str = "table.results.mm tbody tr";

// Next-page anchors carry a site-relative href with the page number appended
pub const POWERBALL_NEXT_HREF_PREFIX: &str = "/powerball/results/";
pub const MEGA_MILLIONS_NEXT_HREF_PREFIX: &str = "/mega-millions/results/";

// Persisted store
pub const POWERBALL_CSV_FILE: &str = "powerball_results.csv";
pub const MEGA_MILLIONS_CSV_FILE: &str = "megamillions_results.csv";

pub const DRAW_DATE_COLUMN: &str = "Draw Date";
pub const WHITE_BALLS_COLUMN: &str = "White Balls";
pub const POWERBALL_SPECIAL_COLUMN: &str = "Powerball";
pub const MEGA_MILLIONS_SPECIAL_COLUMN: &str = "MegaBall";
pub const JACKPOT_COLUMN: &str = "Jackpot";

/// Date format used for the `Draw Date` column and the known-date set.
pub const STORE_DATE_FORMAT: &str = "%m/%d/%Y";

/// Date format accepted on the command line.
pub const CLI_DATE_FORMAT: &str = "%Y-%m-%d";

/// Lookback used when the requested date range cannot be parsed.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Substrings that mark a Cloudflare challenge or an access-denied page.
pub const BLOCK_MARKERS: &[&str] = &["cf-error-details", "Access Denied", "You have been blocked"];

/// Browser identities rotated per request.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.5735.110 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:102.0) Gecko/20100101 Firefox/102.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.5735.110 Safari/537.36 Edg/114.0.0.0",
];

/// Get all supported user-friendly game names
pub fn get_supported_games() -> Vec<&'static str> {
    vec![POWERBALL_GAME, MEGA_MILLIONS_GAME]
}
