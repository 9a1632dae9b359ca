use async_trait::async_trait;

use crate::common::error::{FetchError, Result};
use crate::common::types::DrawRow;

/// Renders a results page and hands back its final HTML.
///
/// One fetcher instance is one session (e.g. one browser). Business retries
/// belong to the caller; implementations only rotate their own identity.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch_page(&mut self, url: &str) -> std::result::Result<String, FetchError>;

    /// Release the session. Called exactly once at the end of a run.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Whole-table access to a persisted dataset
pub trait DrawStore: Send + Sync {
    /// Every stored row; an absent store reads as empty
    fn load(&self) -> Result<Vec<DrawRow>>;

    /// Replace the stored table in one step. Readers never see a partial table.
    fn replace(&self, rows: &[DrawRow]) -> Result<()>;

    /// Human-readable location for logs and summaries
    fn location(&self) -> String;
}
