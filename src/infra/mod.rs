#[cfg(feature = "browser")]
pub mod browser_fetcher;
pub mod http_fetcher;

#[cfg(feature = "browser")]
pub use browser_fetcher::BrowserFetcher;
pub use http_fetcher::HttpFetcher;

use crate::app::ports::PageFetcher;
use crate::common::error::Result;
#[cfg(not(feature = "browser"))]
use crate::common::error::ScraperError;
use crate::config::{FetcherConfig, FetcherKind};

/// Build the page fetcher selected by `config.kind`.
pub async fn create_fetcher(config: &FetcherConfig) -> Result<Box<dyn PageFetcher>> {
    match config.kind {
        FetcherKind::Http => Ok(Box::new(HttpFetcher::new(config.clone())?)),
        #[cfg(feature = "browser")]
        FetcherKind::Browser => Ok(Box::new(BrowserFetcher::launch(config.clone()).await?)),
        #[cfg(not(feature = "browser"))]
        FetcherKind::Browser => Err(ScraperError::Config(
            "fetcher.kind = \"browser\" needs the crate built with the `browser` feature".into(),
        )),
    }
}
