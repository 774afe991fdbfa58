//! In-memory portal for tests.

use crate::scrapers::error::FetchError;
use crate::scrapers::traits::PageFetcher;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;

/// URL to HTML map that records every request; unknown URLs give a 404
#[derive(Default)]
pub struct FixtureSite {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FixtureSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    pub fn remove(&mut self, url: &str) {
        self.pages.remove(url);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FixtureSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }

    fn source_name(&self) -> &'static str {
        "fixture"
    }
}

/// A listing page with one `li.resblock-list` per `(name, district)` pair
pub fn listing_page(items: &[(&str, &str)], total_count: Option<u32>) -> String {
    let listings: String = items
        .iter()
        .map(|(name, district)| {
            format!(
                r#"<li class="resblock-list">
  <a class="resblock-img-wrapper" href="/loupan/p_demo/"><img class="lj-lazy" data-original="//image1.ljcdn.com/newhouse/cover.jpg" src="data:image/gif;base64,R0lGOD"></a>
  <div class="resblock-desc-wrapper">
    <div class="resblock-name"><a class="name" href="/loupan/p_demo/">{name}</a><span class="sale-status">在售</span></div>
    <div class="resblock-location"><span>{district}</span><i>/</i><span>中心</span><i>/</i><a href="/loupan/p_demo/">{name}路1号</a></div>
    <div class="resblock-area"><span>建面 90-120㎡</span></div>
    <div class="resblock-tag"><span>近地铁</span></div>
    <div class="resblock-price"><div class="main-price"><span class="number">60,000</span><span class="desc"> 元/㎡(均价)</span></div></div>
  </div>
</li>"#
            )
        })
        .collect();
    let pager = total_count
        .map(|count| {
            format!(r#"<div class="page-box" data-total-count="{count}" data-current="1"></div>"#)
        })
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>上海新房_上海新楼盘_楼盘信息</title></head>
<body><div class="resblock-list-container"><ul class="resblock-list-wrapper">{listings}</ul>{pager}</div></body></html>"#
    )
}
