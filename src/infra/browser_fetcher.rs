//! Headless Chrome fetcher for pages that only render with JavaScript.
//!
//! One launched browser is one session. Window size is drawn once per launch;
//! the user agent is rotated for every page. The child process is killed when
//! the `Browser` is dropped, so the session is released even if `close` is
//! never reached.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app::ports::PageFetcher;
use crate::common::error::{FetchError, Result, ScraperError};
use crate::config::FetcherConfig;

pub struct BrowserFetcher {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    config: FetcherConfig,
    rng: StdRng,
}

fn browser_error(err: impl std::fmt::Display) -> ScraperError {
    ScraperError::Browser { message: err.to_string() }
}

fn classify(err: CdpError) -> FetchError {
    match err {
        CdpError::Timeout => FetchError::Timeout,
        other => FetchError::Navigation(other.to_string()),
    }
}

impl BrowserFetcher {
    /// Launch a browser with a randomized window size and anti-automation flags.
    pub async fn launch(config: FetcherConfig) -> Result<Self> {
        let mut rng = StdRng::from_entropy();
        let width = rng.gen_range(config.window_width.0..=config.window_width.1);
        let height = rng.gen_range(config.window_height.0..=config.window_height.1);
        info!("Launching browser (headless={}, window={}x{})", config.headless, width, height);

        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .request_timeout(config.page_load_timeout())
            .arg(format!("--window-size={},{}", width, height))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(browser_error)?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(browser_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            config,
            rng,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch_page(&mut self, url: &str) -> std::result::Result<String, FetchError> {
        let user_agent = self.config.random_user_agent(&mut self.rng).to_string();
        let timeout: Duration = self.config.page_load_timeout();
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| FetchError::Navigation("browser session already closed".into()))?;

        let page = browser.new_page("about:blank").await.map_err(classify)?;
        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(classify)?;
        let nav = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(FetchError::Navigation)?;

        debug!("Navigating to {}", url);
        let loaded = tokio::time::timeout(timeout, async {
            page.goto(nav).await?;
            page.wait_for_navigation().await?;
            page.content().await
        })
        .await;

        // Close the tab to prevent accumulation across pages
        let _ = page.close().await;

        match loaded {
            Err(_) => Err(FetchError::Timeout),
            Ok(Err(e)) => Err(classify(e)),
            Ok(Ok(html)) => Ok(html),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut browser) = self.browser.take() {
            info!("Closing browser session");
            browser.close().await.map_err(browser_error)?;
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        Ok(())
    }
}
