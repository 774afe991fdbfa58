//! Finds the per-slug listing shards to crawl beyond the root listing.

use crate::scrapers::district;
use crate::scrapers::traits::PageFetcher;
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to parse anchor selector"));

static RE_DISTRICT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"id:\s*'([a-z0-9]+)'").expect("Failed to compile district id regex"));

static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/loupan/([a-z0-9_]+)/?$").expect("Failed to compile relative slug regex")
});

static RE_PAGINATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^pg\d+$").expect("Failed to compile pagination regex"));

/// Slugs that are navigation rather than shards: `pg<N>` pages and `p_`
/// project detail links
pub fn is_navigation_slug(slug: &str) -> bool {
    RE_PAGINATION.is_match(slug) || slug.starts_with("p_")
}

/// Slugs declared as `id: '<slug>'` in a district definitions source file
pub fn slugs_from_definitions(source: &str) -> Vec<String> {
    RE_DISTRICT_ID
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Slugs linked from a homepage, matching absolute links on `host` or
/// root-relative `/loupan/<slug>/` links
pub fn slugs_from_homepage(html: &str, host: &str) -> Vec<String> {
    let absolute = match Regex::new(&format!(
        r"^https?://{}/loupan/([a-z0-9_]+)/?$",
        regex::escape(host)
    )) {
        Ok(re) => re,
        Err(e) => {
            warn!("Cannot build link pattern for host {}: {}", host, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let href = href.trim();
            absolute
                .captures(href)
                .or_else(|| RE_RELATIVE.captures(href))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Builds the list of shard slugs for one run
pub struct SlugDiscovery<'a> {
    fetcher: &'a dyn PageFetcher,
    base_url: &'a str,
    definitions_file: Option<&'a Path>,
    max_slugs: usize,
}

impl<'a> SlugDiscovery<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        base_url: &'a str,
        definitions_file: Option<&'a Path>,
        max_slugs: usize,
    ) -> Self {
        Self {
            fetcher,
            base_url,
            definitions_file,
            max_slugs,
        }
    }

    /// Seed districts, then slugs from the definitions file, then slugs
    /// linked from the homepage. Deduplicated in that order and cut to
    /// `max_slugs` when it is non-zero.
    pub async fn discover(&self) -> Vec<String> {
        let mut slugs: IndexSet<String> = district::known_slugs().map(str::to_string).collect();

        if let Some(path) = self.definitions_file {
            match tokio::fs::read_to_string(path).await {
                Ok(source) => {
                    let found = slugs_from_definitions(&source);
                    debug!("{} slugs in {}", found.len(), path.display());
                    slugs.extend(found);
                }
                Err(e) => debug!("No district definitions at {}: {}", path.display(), e),
            }
        }

        let homepage = format!("{}/", self.base_url.trim_end_matches('/'));
        match self.fetcher.fetch(&homepage).await {
            Ok(html) => {
                let host = Url::parse(&homepage)
                    .ok()
                    .and_then(|url| url.host_str().map(str::to_string))
                    .unwrap_or_default();
                let found = slugs_from_homepage(&html, &host);
                debug!("{} slug links on homepage", found.len());
                slugs.extend(found);
            }
            Err(e) => warn!("Homepage fetch failed, using seed slugs only: {}", e),
        }

        let mut slugs: Vec<String> = slugs
            .into_iter()
            .filter(|slug| !is_navigation_slug(slug))
            .collect();
        if self.max_slugs > 0 {
            slugs.truncate(self.max_slugs);
        }

        info!("Discovered {} slugs to crawl", slugs.len());
        slugs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::FixtureSite;

    const BASE: &str = "https://sh.fang.ke.com";

    const HOMEPAGE: &str = r#"<html><body>
        <a href="https://sh.fang.ke.com/loupan/lingang/">临港</a>
        <a href="/loupan/qiantan/">前滩</a>
        <a href="/loupan/pg2/">下一页</a>
        <a href="/loupan/p_hsmdabcd/">楼盘详情</a>
        <a href="https://sh.fang.ke.com/loupan/pudong/">浦东</a>
        <a href="https://bj.fang.ke.com/loupan/chaoyang/">北京朝阳</a>
        <a href="/ershoufang/jingan/">二手房</a>
        <a href="/loupan/qiantan/">前滩</a>
    </body></html>"#;

    #[test]
    fn definitions_file_pattern() {
        let source = "export const districts = [\n  { id: 'pudong', name: '浦东' },\n  { id:'xinchang', name: '新场' },\n  { id: \"bad\" },\n];";
        assert_eq!(slugs_from_definitions(source), vec!["pudong", "xinchang"]);
    }

    #[test]
    fn homepage_links_match_both_shapes() {
        let slugs = slugs_from_homepage(HOMEPAGE, "sh.fang.ke.com");
        assert_eq!(
            slugs,
            vec!["lingang", "qiantan", "pg2", "p_hsmdabcd", "pudong", "qiantan"]
        );
    }

    #[test]
    fn navigation_slugs() {
        assert!(is_navigation_slug("pg2"));
        assert!(is_navigation_slug("pg15"));
        assert!(is_navigation_slug("p_abc"));
        assert!(!is_navigation_slug("pgxiang"));
        assert!(!is_navigation_slug("pudong"));
    }

    #[tokio::test]
    async fn discover_merges_dedupes_and_filters() {
        let mut site = FixtureSite::new();
        site.insert(format!("{BASE}/"), HOMEPAGE);

        let slugs = SlugDiscovery::new(&site, BASE, None, 0).discover().await;

        assert_eq!(slugs.len(), 18);
        assert_eq!(slugs[0], "huangpu");
        assert_eq!(&slugs[16..], ["lingang", "qiantan"]);
        assert!(!slugs.iter().any(|s| is_navigation_slug(s)));
        assert_eq!(site.requests(), vec![format!("{BASE}/")]);
    }

    #[tokio::test]
    async fn discover_survives_homepage_failure_and_truncates() {
        let site = FixtureSite::new();

        let slugs = SlugDiscovery::new(&site, BASE, None, 5).discover().await;

        assert_eq!(slugs, vec!["huangpu", "xuhui", "changning", "jingan", "putuo"]);
    }

    #[tokio::test]
    async fn discover_reads_definitions_file() {
        let path = std::env::temp_dir().join(format!(
            "loupan-crawler-districts-{}.ts",
            std::process::id()
        ));
        tokio::fs::write(&path, "[{ id: 'huangpu' }, { id: 'zhangjiang' }]")
            .await
            .unwrap();
        let site = FixtureSite::new();

        let slugs = SlugDiscovery::new(&site, BASE, Some(path.as_path()), 0)
            .discover()
            .await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(slugs.len(), 17);
        assert_eq!(slugs.last().map(String::as_str), Some("zhangjiang"));
    }
}
