use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to replace store file {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {message}")]
    Browser { message: String },
}

pub type Result<T> = std::result::Result<T, ScraperError>;

/// Transport-level failure reported by a page fetcher.
///
/// These never abort a run; the scrape controller maps them onto stop reasons.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("page load timed out")]
    Timeout,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("request blocked by site: {0}")]
    Blocked(String),
}
