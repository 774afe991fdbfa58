use crate::models::ListingRecord;
use crate::scrapers::parser::{total_pages, ListingParser};
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{PathOutcome, StopReason};
use tracing::{debug, info, warn};

/// Title text of the portal's login page
const LOGIN_TITLE_MARKER: &str = "登录";
/// Mount point of the login single-page app
const LOGIN_APP_MARKER: &str = "login-app";

/// Whether a body looks like a login wall or block page rather than a listing
pub fn is_blocked(html: &str, min_page_bytes: usize) -> bool {
    if html.len() < min_page_bytes || html.contains(LOGIN_APP_MARKER) {
        return true;
    }
    page_title(html).is_some_and(|title| title.contains(LOGIN_TITLE_MARKER))
}

/// Text of the first `<title>` element, tag names matched case-insensitively
fn page_title(html: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets valid for `html`
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title")?;
    let open_end = start + lower[start..].find('>')? + 1;
    let close = open_end + lower[open_end..].find("</title")?;
    Some(&html[open_end..close])
}

/// URL of page `page` under a listing base path (`.../pg<N>/` for N > 1)
pub fn page_url(base_url: &str, page: u32) -> String {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    if page <= 1 {
        base
    } else {
        format!("{}pg{}/", base, page)
    }
}

/// Records and counters gathered across a whole run
#[derive(Debug, Default)]
pub struct CrawlAccumulator {
    pub records: Vec<ListingRecord>,
    pub outcomes: Vec<PathOutcome>,
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub out_of_scope: usize,
    pub unnamed: usize,
}

/// Walks the pages of one base path
pub struct PathCrawler<'a> {
    fetcher: &'a dyn PageFetcher,
    parser: &'a ListingParser,
    page_size: u32,
    min_page_bytes: usize,
}

impl<'a> PathCrawler<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        parser: &'a ListingParser,
        page_size: u32,
        min_page_bytes: usize,
    ) -> Self {
        Self {
            fetcher,
            parser,
            page_size,
            min_page_bytes,
        }
    }

    /// Crawl `base_url` page by page into `acc`.
    ///
    /// The total page count is read from the first page only and never
    /// exceeds `max_pages`. A failed page is skipped, a blocked page ends the
    /// path, and a page with no records means the path is exhausted.
    pub async fn crawl(
        &self,
        base_url: &str,
        tag: &str,
        max_pages: u32,
        acc: &mut CrawlAccumulator,
    ) -> PathOutcome {
        let mut outcome = PathOutcome {
            path: tag.to_string(),
            reason: StopReason::Completed,
            pages_visited: 0,
            pages_failed: 0,
            records: 0,
        };
        let ceiling = max_pages.max(1);
        let mut total = 1;
        let mut page = 1;

        while page <= total && page <= ceiling {
            let url = page_url(base_url, page);
            debug!("[{}] fetching page {}/{}: {}", tag, page, total, url);
            outcome.pages_visited += 1;

            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("[{}] page {} failed, skipping: {}", tag, page, e);
                    outcome.pages_failed += 1;
                    acc.pages_failed += 1;
                    page += 1;
                    continue;
                }
            };
            acc.pages_fetched += 1;

            if is_blocked(&html, self.min_page_bytes) {
                warn!(
                    "[{}] login wall or block page at page {} ({} bytes), stopping path",
                    tag,
                    page,
                    html.len()
                );
                outcome.reason = StopReason::Blocked;
                break;
            }

            let parsed = self.parser.parse(&html, tag, page);
            acc.out_of_scope += parsed.out_of_scope;
            acc.unnamed += parsed.unnamed;

            if page == 1 {
                total = total_pages(parsed.total_count, self.page_size, ceiling);
                info!(
                    "[{}] {} pages to crawl (total count {:?})",
                    tag, total, parsed.total_count
                );
            }

            if parsed.records.is_empty() {
                info!("[{}] page {} has no listings, path exhausted", tag, page);
                outcome.reason = StopReason::Exhausted;
                break;
            }

            info!(
                "[{}] page {}: {} of {} listings kept ({} outside Shanghai)",
                tag,
                page,
                parsed.records.len(),
                parsed.elements,
                parsed.out_of_scope
            );
            outcome.records += parsed.records.len();
            acc.records.extend(parsed.records);
            page += 1;
        }

        info!(
            "[{}] done: {:?} after {} pages, {} listings",
            tag, outcome.reason, outcome.pages_visited, outcome.records
        );
        acc.outcomes.push(outcome.clone());
        outcome
    }
}
