//! Renders the final record set as a TypeScript data module for the UI.

use crate::models::{Coordinates, ListingRecord, SaleStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A record as the UI sees it, without crawl provenance
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishedListing<'a> {
    id: &'a str,
    name: &'a str,
    district: &'a str,
    sub_district: &'a str,
    price: f64,
    price_unit: &'a str,
    area_range: &'a str,
    status: SaleStatus,
    features: &'a [String],
    image: &'a str,
    address: &'a str,
    description: &'a str,
    coordinates: Coordinates,
    is_synthesized_location: bool,
}

impl<'a> From<&'a ListingRecord> for PublishedListing<'a> {
    fn from(record: &'a ListingRecord) -> Self {
        Self {
            id: &record.id,
            name: &record.name,
            district: &record.district_slug,
            sub_district: &record.sub_district_label,
            price: record.price,
            price_unit: &record.price_unit,
            area_range: &record.area_range,
            status: record.status,
            features: &record.features,
            image: &record.image,
            address: &record.address,
            description: &record.description,
            coordinates: record.coordinates,
            is_synthesized_location: record.is_synthesized_location,
        }
    }
}

const TYPES: &str = r#"export type SaleStatus = 'on-sale' | 'pending' | 'sold-out';

export interface NewHome {
  id: string;
  name: string;
  district: string;
  subDistrict: string;
  price: number;
  priceUnit: string;
  areaRange: string;
  status: SaleStatus;
  features: string[];
  image: string;
  address: string;
  description: string;
  coordinates: { lat: number; lng: number };
  /** true when coordinates are a placeholder near the city centre, not a geocode */
  isSynthesizedLocation: boolean;
}
"#;

const ACCESSORS: &str = r#"export function getNewHomeById(id: string): NewHome | undefined {
  return newHomes.find((home) => home.id === id);
}

export function getNewHomesByDistrict(district: string): NewHome[] {
  return newHomes.filter((home) => home.district === district);
}

export function getNewHomesBySubDistrict(subDistrict: string): NewHome[] {
  return newHomes.filter((home) => home.subDistrict === subDistrict);
}

export function getRandomNewHomes(count: number): NewHome[] {
  const pool = [...newHomes];
  for (let i = pool.length - 1; i > 0; i--) {
    const j = Math.floor(Math.random() * (i + 1));
    [pool[i], pool[j]] = [pool[j], pool[i]];
  }
  return pool.slice(0, Math.max(0, count));
}

export function getAvailableNewHomes(): NewHome[] {
  return newHomes.filter((home) => home.status !== 'sold-out');
}
"#;

/// Render `records` as a self-contained TypeScript module
pub fn emit(records: &[ListingRecord], generated_at: DateTime<Utc>) -> serde_json::Result<String> {
    let published: Vec<PublishedListing<'_>> = records.iter().map(PublishedListing::from).collect();
    let literal = serde_json::to_string_pretty(&published)?;

    let mut module = String::with_capacity(literal.len() + TYPES.len() + ACCESSORS.len() + 256);
    module.push_str("// Generated by loupan-crawler. Do not edit by hand; re-run the crawler instead.\n");
    module.push_str(&format!(
        "// {} listings, generated at {}\n\n",
        records.len(),
        generated_at.to_rfc3339()
    ));
    module.push_str(TYPES);
    module.push('\n');
    module.push_str("export const newHomes: NewHome[] = ");
    module.push_str(&literal);
    module.push_str(";\n\n");
    module.push_str(ACCESSORS);
    Ok(module)
}
