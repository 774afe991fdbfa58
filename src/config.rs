use crate::scrapers::types::{CrawlSettings, FetchSettings, DEFAULT_BASE_URL};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Crawl Shanghai new-home listings into a TypeScript data module.
///
/// Every option can also be set through the environment (or a `.env` file).
#[derive(Debug, Parser)]
#[command(name = "loupan-crawler", version)]
pub struct Cli {
    /// Portal host to crawl
    #[arg(long, env = "CRAWL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Generated module path, overwritten on every run
    #[arg(long, env = "CRAWL_OUTPUT", default_value = "src/data/newHomes.ts")]
    pub output: PathBuf,

    /// District definitions file to mine extra slugs from
    #[arg(long, env = "CRAWL_DISTRICTS_FILE", default_value = "src/data/districts.ts")]
    pub districts_file: PathBuf,

    /// Also write deduplicated records with provenance as JSON here
    #[arg(long, env = "CRAWL_RAW_DUMP")]
    pub raw_dump: Option<PathBuf>,

    /// Request timeout in milliseconds
    #[arg(long, env = "CRAWL_TIMEOUT_MS", default_value_t = 15_000)]
    pub timeout_ms: u64,

    /// Minimum pause after each request in milliseconds
    #[arg(long, env = "CRAWL_DELAY_MIN_MS", default_value_t = 800)]
    pub delay_min_ms: u64,

    /// Maximum pause after each request in milliseconds
    #[arg(long, env = "CRAWL_DELAY_MAX_MS", default_value_t = 2_000)]
    pub delay_max_ms: u64,

    /// Page ceiling for the root listing
    #[arg(long, env = "CRAWL_MAX_PAGES", default_value_t = 30)]
    pub max_pages: u32,

    /// Page ceiling for each discovered slug
    #[arg(long, env = "CRAWL_SHARD_MAX_PAGES", default_value_t = 10)]
    pub shard_max_pages: u32,

    /// Cap on discovered slugs (0 = no cap)
    #[arg(long, env = "CRAWL_MAX_SLUGS", default_value_t = 0)]
    pub max_slugs: usize,

    /// Listings per page on the portal
    #[arg(long, env = "CRAWL_PAGE_SIZE", default_value_t = 10)]
    pub page_size: u32,

    /// Bodies shorter than this many bytes count as a block page
    #[arg(long, env = "CRAWL_MIN_PAGE_BYTES", default_value_t = 1_500)]
    pub min_page_bytes: usize,

    /// Crawl the root listing only
    #[arg(long, env = "CRAWL_SKIP_DISCOVERY")]
    pub skip_discovery: bool,
}

impl Cli {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            delay_min: Duration::from_millis(self.delay_min_ms),
            delay_max: Duration::from_millis(self.delay_max_ms),
        }
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            root_max_pages: self.max_pages,
            shard_max_pages: self.shard_max_pages,
            max_slugs: self.max_slugs,
            page_size: self.page_size,
            min_page_bytes: self.min_page_bytes,
            districts_file: Some(self.districts_file.clone()),
            skip_discovery: self.skip_discovery,
        }
    }
}
