use serde::Serialize;
use std::fmt;

/// Sale status of a new-home project
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SaleStatus {
    #[default]
    OnSale,
    Pending,
    SoldOut,
}

impl SaleStatus {
    /// Map a free-text source label (e.g. "在售", "待售", "售罄") to a status.
    /// Anything unrecognised counts as on sale.
    pub fn from_label(label: &str) -> Self {
        if label.contains("售罄") || label.contains("已售") || label.contains("售完") {
            SaleStatus::SoldOut
        } else if label.contains("待售") || label.contains("未开盘") {
            SaleStatus::Pending
        } else {
            SaleStatus::OnSale
        }
    }
}

/// A WGS84-ish point
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Which crawl path and page produced a record
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceTag {
    pub path: String,
    pub page: u32,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#pg{}", self.path, self.page)
    }
}

/// One new-home project as extracted from a listing page
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "district")]
    pub district_slug: String,
    #[serde(rename = "subDistrict")]
    pub sub_district_label: String,
    pub price: f64,
    pub price_unit: String,
    pub area_range: String,
    pub status: SaleStatus,
    pub features: Vec<String>,
    pub image: String,
    pub address: String,
    pub description: String,
    pub coordinates: Coordinates,
    /// True when `coordinates` were generated rather than read from the page
    pub is_synthesized_location: bool,
    pub source_tag: SourceTag,
}
