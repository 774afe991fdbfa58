pub mod dedupe;
pub mod emitter;

pub use dedupe::dedupe;
pub use emitter::emit;

use crate::models::ListingRecord;
use crate::scrapers::discovery::SlugDiscovery;
use crate::scrapers::pagination::{CrawlAccumulator, PathCrawler};
use crate::scrapers::parser::ListingParser;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{CrawlSettings, PathOutcome};
use thiserror::Error;
use tracing::info;

/// Tag of the root listing crawl in source tags and logs
pub const ROOT_PATH_TAG: &str = "root";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no listings collected across {paths} paths ({pages_failed} pages failed)")]
    NothingCollected { paths: usize, pages_failed: u32 },

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Result of a full crawl run
#[derive(Debug)]
pub struct CrawlReport {
    /// Deduplicated records, provenance still attached
    pub records: Vec<ListingRecord>,
    pub outcomes: Vec<PathOutcome>,
    pub pages_fetched: u32,
    pub pages_failed: u32,
    /// Records parsed before deduplication
    pub parsed: usize,
    pub duplicates: usize,
    pub out_of_scope: usize,
    pub unnamed: usize,
}

/// Crawl the root listing, then every discovered shard, and deduplicate.
///
/// Per-page and per-path failures are logged and skipped. The run fails only
/// when nothing survives deduplication.
pub async fn run(
    fetcher: &dyn PageFetcher,
    settings: &CrawlSettings,
) -> Result<CrawlReport, PipelineError> {
    let parser = ListingParser::new(&settings.base_url)?;
    let crawler = PathCrawler::new(fetcher, &parser, settings.page_size, settings.min_page_bytes);
    let mut acc = CrawlAccumulator::default();

    info!("Crawling root listing via {}", fetcher.source_name());
    crawler
        .crawl(
            &settings.root_listing_url(),
            ROOT_PATH_TAG,
            settings.root_max_pages,
            &mut acc,
        )
        .await;

    if settings.skip_discovery {
        info!("Slug discovery disabled, root listing only");
    } else {
        let slugs = SlugDiscovery::new(
            fetcher,
            &settings.base_url,
            settings.districts_file.as_deref(),
            settings.max_slugs,
        )
        .discover()
        .await;

        for (i, slug) in slugs.iter().enumerate() {
            info!("Shard {}/{}: {}", i + 1, slugs.len(), slug);
            crawler
                .crawl(
                    &settings.shard_listing_url(slug),
                    slug,
                    settings.shard_max_pages,
                    &mut acc,
                )
                .await;
        }
    }

    finish(acc)
}

fn finish(acc: CrawlAccumulator) -> Result<CrawlReport, PipelineError> {
    let parsed = acc.records.len();
    let records = dedupe(acc.records);
    let duplicates = parsed - records.len();

    info!(
        "Crawl finished: {} pages fetched, {} failed, {} parsed, {} duplicates, {} outside Shanghai, {} unnamed",
        acc.pages_fetched,
        acc.pages_failed,
        parsed,
        duplicates,
        acc.out_of_scope,
        acc.unnamed
    );

    if records.is_empty() {
        return Err(PipelineError::NothingCollected {
            paths: acc.outcomes.len(),
            pages_failed: acc.pages_failed,
        });
    }

    Ok(CrawlReport {
        records,
        outcomes: acc.outcomes,
        pages_fetched: acc.pages_fetched,
        pages_failed: acc.pages_failed,
        parsed,
        duplicates,
        out_of_scope: acc.out_of_scope,
        unnamed: acc.unnamed,
    })
}
