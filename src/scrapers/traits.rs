use crate::scrapers::error::FetchError;
use async_trait::async_trait;

/// Source of listing-page HTML.
///
/// The live implementation is [`crate::scrapers::HttpFetcher`]; tests plug in
/// an in-memory site.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page and return its body
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Get the name of the fetcher, for logs
    fn source_name(&self) -> &'static str;
}
