use std::path::PathBuf;
use std::time::Duration;

/// Default portal host for Shanghai new homes
pub const DEFAULT_BASE_URL: &str = "https://sh.fang.ke.com";

/// Settings for the HTTP layer
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Host used for the Referer header
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Lower bound of the post-request delay
    pub delay_min: Duration,
    /// Upper bound of the post-request delay
    pub delay_max: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(15_000),
            delay_min: Duration::from_millis(800),
            delay_max: Duration::from_millis(2_000),
        }
    }
}

/// Settings for one full crawl run
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Portal host, without trailing slash
    pub base_url: String,
    /// Page ceiling for the root listing
    pub root_max_pages: u32,
    /// Page ceiling for each discovered slug
    pub shard_max_pages: u32,
    /// Cap on discovered slugs, 0 for no cap
    pub max_slugs: usize,
    /// Listings per page, used to turn the total count into a page count
    pub page_size: u32,
    /// Bodies shorter than this are treated as a block wall
    pub min_page_bytes: usize,
    /// Optional local file to mine extra slugs from
    pub districts_file: Option<PathBuf>,
    /// Crawl only the root listing
    pub skip_discovery: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            root_max_pages: 30,
            shard_max_pages: 10,
            max_slugs: 0,
            page_size: 10,
            min_page_bytes: 1_500,
            districts_file: None,
            skip_discovery: false,
        }
    }
}

impl CrawlSettings {
    /// `<base>/loupan/`
    pub fn root_listing_url(&self) -> String {
        format!("{}/loupan/", self.base_url.trim_end_matches('/'))
    }

    /// `<base>/loupan/<slug>/`
    pub fn shard_listing_url(&self, slug: &str) -> String {
        format!("{}{}/", self.root_listing_url(), slug)
    }
}

/// Why a path crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Walked past the detected total or the configured ceiling
    Completed,
    /// A page parsed to zero listings
    Exhausted,
    /// Login wall or block page detected
    Blocked,
}

/// Summary of one crawled base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOutcome {
    pub path: String,
    pub reason: StopReason,
    /// Pages requested, failed ones included
    pub pages_visited: u32,
    pub pages_failed: u32,
    pub records: usize,
}
