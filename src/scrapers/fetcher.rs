use crate::scrapers::error::FetchError;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::FetchSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Rate-limited HTTP fetcher with browser-like headers.
///
/// Every request, successful or not, is followed by a random pause drawn
/// from `[delay_min, delay_max]`. There are no retries.
pub struct HttpFetcher {
    client: Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let referer = format!("{}/", settings.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.6"),
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&referer).context("Invalid base URL for Referer header")?,
        );

        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            settings: normalize_delays(settings),
        })
    }

    async fn request(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout: self.settings.timeout,
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }

    fn next_delay(&self) -> Duration {
        random_delay(self.settings.delay_min, self.settings.delay_max)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching URL: {}", url);
        let result = self.request(url).await;

        let delay = self.next_delay();
        debug!("Sleeping {:?} before next request", delay);
        tokio::time::sleep(delay).await;

        if let Ok(body) = &result {
            debug!("Downloaded {} bytes from {}", body.len(), url);
        }
        result
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Raise `delay_max` to `delay_min` when the window is inverted
fn normalize_delays(mut settings: FetchSettings) -> FetchSettings {
    if settings.delay_min > settings.delay_max {
        settings.delay_max = settings.delay_min;
    }
    settings
}

fn random_delay(min: Duration, max: Duration) -> Duration {
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
