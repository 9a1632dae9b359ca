use crate::app::ports::PageFetcher;
use crate::common::error::{FetchError, Result};
use crate::config::FetcherConfig;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;

/// Plain HTTP fetcher. Picks a fresh user agent for every request.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    rng: StdRng,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        // reqwest handles gzip/deflate decompression with the features enabled
        let client = reqwest::Client::builder()
            .timeout(config.page_load_timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            rng: StdRng::from_entropy(),
        })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Navigation(err.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&mut self, url: &str) -> std::result::Result<String, FetchError> {
        let user_agent = self.config.random_user_agent(&mut self.rng).to_string();
        tracing::debug!("HTTP GET {} as {}", url, user_agent);

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if matches!(
            status,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return Err(FetchError::Blocked(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(FetchError::Navigation(format!("HTTP {}", status.as_u16())));
        }

        let body = resp.text().await.map_err(classify)?;
        tracing::debug!("HTTP response: status={}, size={} bytes", status.as_u16(), body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with a canned response and returns the URL to hit
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}/powerball/results/1")
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let url = serve_once("200 OK", "<table class=\"results pb\"></table>").await;
        let mut fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let html = fetcher.fetch_page(&url).await.unwrap();
        assert!(html.contains("results pb"));
    }

    #[tokio::test]
    async fn test_forbidden_is_blocked() {
        let url = serve_once("403 Forbidden", "Access Denied").await;
        let mut fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        assert_eq!(fetcher.fetch_page(&url).await, Err(FetchError::Blocked("HTTP 403".into())));
    }

    #[tokio::test]
    async fn test_not_found_is_navigation_error() {
        let url = serve_once("404 Not Found", "").await;
        let mut fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        assert_eq!(fetcher.fetch_page(&url).await, Err(FetchError::Navigation("HTTP 404".into())));
    }

    #[tokio::test]
    async fn test_connection_refused_is_navigation_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let result = fetcher.fetch_page(&format!("http://{addr}/")).await;
        assert!(matches!(result, Err(FetchError::Navigation(_))));
    }
}
