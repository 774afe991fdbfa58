//! Listing-page HTML to [`ListingRecord`]s.
//!
//! Each field is read through an ordered list of extractors; the first one
//! that yields a non-empty value wins.

use crate::models::{Coordinates, ListingRecord, SaleStatus, SourceTag};
use crate::scrapers::district;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Approximate centre of Shanghai, used for synthesized locations
pub const SHANGHAI_CENTER: Coordinates = Coordinates {
    lat: 31.2304,
    lng: 121.4737,
};

const LAT_SPREAD: f64 = 0.15;
const LNG_SPREAD: f64 = 0.2;

const PLACEHOLDER_IMAGE_PATH: &str = "/static/images/loupan-placeholder.png";

struct ListingSelectors {
    item: Selector,
    name_link: Selector,
    name_any: Selector,
    location_span: Selector,
    location_link: Selector,
    price: Selector,
    price_desc: Selector,
    price_second: Selector,
    area_span: Selector,
    area: Selector,
    sale_status: Selector,
    resblock_type: Selector,
    tag: Selector,
    lazy_image: Selector,
    image: Selector,
    geo: Selector,
    page_box: Selector,
}

static SELECTORS: Lazy<ListingSelectors> = Lazy::new(|| ListingSelectors {
    item: Selector::parse("li.resblock-list").expect("Failed to parse item selector"),
    name_link: Selector::parse(".resblock-name a.name").expect("Failed to parse name selector"),
    name_any: Selector::parse(".resblock-name a[title]")
        .expect("Failed to parse name fallback selector"),
    location_span: Selector::parse(".resblock-location span")
        .expect("Failed to parse location selector"),
    location_link: Selector::parse(".resblock-location a")
        .expect("Failed to parse address selector"),
    price: Selector::parse(".resblock-price .main-price").expect("Failed to parse price selector"),
    price_desc: Selector::parse(".main-price .desc").expect("Failed to parse unit selector"),
    price_second: Selector::parse(".resblock-price .second")
        .expect("Failed to parse second price selector"),
    area_span: Selector::parse(".resblock-area span").expect("Failed to parse area selector"),
    area: Selector::parse(".resblock-area").expect("Failed to parse area fallback selector"),
    sale_status: Selector::parse(".sale-status").expect("Failed to parse status selector"),
    resblock_type: Selector::parse(".resblock-type")
        .expect("Failed to parse status fallback selector"),
    tag: Selector::parse(".resblock-tag span").expect("Failed to parse tag selector"),
    lazy_image: Selector::parse("img[data-original]").expect("Failed to parse image selector"),
    image: Selector::parse("img[src]").expect("Failed to parse image fallback selector"),
    geo: Selector::parse("[data-lat][data-lng]").expect("Failed to parse geo selector"),
    page_box: Selector::parse(".page-box[data-total-count]")
        .expect("Failed to parse pagination selector"),
});

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("Failed to compile number regex"));

/// One field extractor over a listing element
type Extractor = fn(&ElementRef<'_>) -> Option<String>;

/// Run extractors in order, first non-empty result wins
fn first_of(element: &ElementRef<'_>, extractors: &[Extractor]) -> Option<String> {
    extractors
        .iter()
        .filter_map(|extract| extract(element))
        .find(|value| !value.is_empty())
}

fn clean_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_of(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(clean_text)
}

fn attr_of(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty() && !value.starts_with("data:"))
}

fn name_link(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.name_link)
}

fn name_title(el: &ElementRef<'_>) -> Option<String> {
    attr_of(el, &SELECTORS.name_any, "title")
}

fn price_desc(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.price_desc)
}

fn price_second(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.price_second)
}

fn area_span(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.area_span)
}

fn area_block(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.area)
}

fn sale_status(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.sale_status)
}

fn resblock_type(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.resblock_type)
}

fn lazy_image(el: &ElementRef<'_>) -> Option<String> {
    attr_of(el, &SELECTORS.lazy_image, "data-original")
}

fn image_src(el: &ElementRef<'_>) -> Option<String> {
    attr_of(el, &SELECTORS.image, "src")
}

fn location_link(el: &ElementRef<'_>) -> Option<String> {
    text_of(el, &SELECTORS.location_link)
}

const NAME: &[Extractor] = &[name_link, name_title];
const PRICE_UNIT: &[Extractor] = &[price_desc, price_second];
const AREA: &[Extractor] = &[area_span, area_block];
const STATUS: &[Extractor] = &[sale_status, resblock_type];
const IMAGE: &[Extractor] = &[lazy_image, image_src];
const ADDRESS: &[Extractor] = &[location_link];

/// Everything one listing page yielded
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub records: Vec<ListingRecord>,
    /// Listing elements found on the page, kept or not
    pub elements: usize,
    /// Elements dropped because their district is not in Shanghai
    pub out_of_scope: usize,
    /// Elements dropped because no name could be read
    pub unnamed: usize,
    /// `data-total-count` of the pagination box, when present
    pub total_count: Option<i64>,
}

/// Parser for the portal's new-home listing pages
pub struct ListingParser {
    base_url: Url,
    placeholder_image: String,
}

impl ListingParser {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url)?;
        let placeholder_image = base_url.join(PLACEHOLDER_IMAGE_PATH)?.to_string();
        Ok(Self {
            base_url,
            placeholder_image,
        })
    }

    /// Extract every in-scope listing on a page.
    ///
    /// A page without listing elements gives an empty [`ParsedPage`], never
    /// an error.
    pub fn parse(&self, html: &str, source_path: &str, page: u32) -> ParsedPage {
        let document = Html::parse_document(html);
        let mut parsed = ParsedPage {
            total_count: total_count(&document),
            ..ParsedPage::default()
        };

        for element in document.select(&SELECTORS.item) {
            parsed.elements += 1;

            let Some(name) = first_of(&element, NAME) else {
                parsed.unnamed += 1;
                continue;
            };

            let mut locations = element.select(&SELECTORS.location_span).map(clean_text);
            let district_text = locations.next().unwrap_or_default();
            let sub_district = locations.next().unwrap_or_default();

            if !district::is_in_scope(&district_text) {
                debug!("Skipping '{}' outside Shanghai ({})", name, district_text);
                parsed.out_of_scope += 1;
                continue;
            }
            let district_slug = district::normalize(&district_text);

            let price = element
                .select(&SELECTORS.price)
                .next()
                .map(|el| parse_price(&clean_text(el)))
                .unwrap_or(0.0);

            let features: Vec<String> = element
                .select(&SELECTORS.tag)
                .map(clean_text)
                .filter(|tag| !tag.is_empty())
                .collect();

            let image = first_of(&element, IMAGE)
                .and_then(|raw| self.absolute_url(&raw))
                .unwrap_or_else(|| self.placeholder_image.clone());

            let address = first_of(&element, ADDRESS)
                .unwrap_or_else(|| format!("{}{}", district_text, sub_district));

            let id = listing_id(&name, &address, &district_slug);
            let (coordinates, is_synthesized_location) = match page_coordinates(&element) {
                Some(point) => (point, false),
                None => (synthesized_coordinates(&id), true),
            };

            let description = describe(&name, &district_text, &sub_district, &features);

            parsed.records.push(ListingRecord {
                id,
                name,
                district_slug,
                sub_district_label: sub_district,
                price,
                price_unit: first_of(&element, PRICE_UNIT).unwrap_or_default(),
                area_range: first_of(&element, AREA).unwrap_or_default(),
                status: SaleStatus::from_label(&first_of(&element, STATUS).unwrap_or_default()),
                features,
                image,
                address,
                description,
                coordinates,
                is_synthesized_location,
                source_tag: SourceTag {
                    path: source_path.to_string(),
                    page,
                },
            });
        }

        parsed
    }

    fn absolute_url(&self, raw: &str) -> Option<String> {
        self.base_url.join(raw).ok().map(|url| url.to_string())
    }
}

fn total_count(document: &Html) -> Option<i64> {
    document
        .select(&SELECTORS.page_box)
        .next()
        .and_then(|el| el.value().attr("data-total-count"))
        .and_then(|raw| raw.trim().parse::<i64>().ok())
}

/// Pages implied by a total listing count, clamped to `max_pages`.
/// Missing or non-positive counts mean a single page.
pub fn total_pages(total_count: Option<i64>, page_size: u32, max_pages: u32) -> u32 {
    let pages = match total_count {
        Some(count) if count > 0 => {
            let size = i64::from(page_size.max(1));
            let pages = (count - 1) / size + 1;
            u32::try_from(pages).unwrap_or(u32::MAX)
        }
        _ => 1,
    };
    pages.min(max_pages.max(1))
}

/// First decimal or integer in the text after dropping thousands separators.
/// Returns 0 when there is none.
pub fn parse_price(text: &str) -> f64 {
    let cleaned = text.replace([',', '，'], "");
    RE_NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Stable id from name, address and district
pub fn listing_id(name: &str, address: &str, district_slug: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0x1f]);
    hasher.update(address.as_bytes());
    hasher.update(&[0x1f]);
    hasher.update(district_slug.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("sh-{}", &hex.as_str()[..16])
}

fn page_coordinates(element: &ElementRef<'_>) -> Option<Coordinates> {
    let read = |el: &ElementRef<'_>| {
        let lat = el.value().attr("data-lat")?.trim().parse::<f64>().ok()?;
        let lng = el.value().attr("data-lng")?.trim().parse::<f64>().ok()?;
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Coordinates { lat, lng })
    };
    read(element).or_else(|| element.select(&SELECTORS.geo).find_map(|el| read(&el)))
}

/// Placeholder point near the city centre, seeded by the listing id so the
/// same listing always lands on the same spot. Not a geocode.
pub fn synthesized_coordinates(id: &str) -> Coordinates {
    let digest = blake3::hash(id.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest.as_bytes()[..8]);
    let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));
    Coordinates {
        lat: SHANGHAI_CENTER.lat + rng.gen_range(-LAT_SPREAD..LAT_SPREAD),
        lng: SHANGHAI_CENTER.lng + rng.gen_range(-LNG_SPREAD..LNG_SPREAD),
    }
}

fn describe(name: &str, district: &str, sub_district: &str, features: &[String]) -> String {
    let mut description = format!("{}，位于{}{}", name, district, sub_district);
    if !features.is_empty() {
        description.push('。');
        description.push_str(&features.join("、"));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://sh.fang.ke.com";

    fn listing(name: &str, district: &str, sub: &str, extra: &str) -> String {
        format!(
            r#"<li class="resblock-list">
                <a class="resblock-img-wrapper" href="/loupan/p_x/">
                  <img class="lj-lazy" src="data:image/gif;base64,R0lGOD" data-original="//image1.ljcdn.com/x/cover.jpg">
                </a>
                <div class="resblock-desc-wrapper">
                  <div class="resblock-name">
                    <a class="name" href="/loupan/p_x/">{name}</a>
                    <span class="sale-status">在售</span>
                  </div>
                  <div class="resblock-location">
                    <span>{district}</span><i>/</i><span>{sub}</span><i>/</i>
                    <a href="/loupan/p_x/">{sub}路88号</a>
                  </div>
                  <div class="resblock-area"><span>建面 89-140㎡</span></div>
                  <div class="resblock-tag"><span>近地铁</span><span> </span><span>品牌房企</span></div>
                  <div class="resblock-price">
                    <div class="main-price"><span class="number">68,500</span><span class="desc">&nbsp;元/㎡(均价)</span></div>
                  </div>
                  {extra}
                </div>
              </li>"#
        )
    }

    fn page(items: &[String], total: Option<u32>) -> String {
        let pager = total
            .map(|t| format!(r#"<div class="page-box" data-total-count="{t}"></div>"#))
            .unwrap_or_default();
        format!(
            "<html><head><title>上海新房</title></head><body><ul class=\"resblock-list-wrapper\">{}</ul>{}</body></html>",
            items.join(""),
            pager
        )
    }

    #[test]
    fn parses_a_full_listing() {
        let parser = ListingParser::new(BASE).unwrap();
        let html = page(&[listing("海上名邸", "浦东", "川沙", "")], Some(1));
        let parsed = parser.parse(&html, "root", 1);

        assert_eq!(parsed.elements, 1);
        assert_eq!(parsed.total_count, Some(1));
        let record = &parsed.records[0];
        assert_eq!(record.name, "海上名邸");
        assert_eq!(record.district_slug, "pudong");
        assert_eq!(record.sub_district_label, "川沙");
        assert_eq!(record.price, 68500.0);
        assert_eq!(record.price_unit, "元/㎡(均价)");
        assert_eq!(record.area_range, "建面 89-140㎡");
        assert_eq!(record.status, SaleStatus::OnSale);
        assert_eq!(record.features, vec!["近地铁", "品牌房企"]);
        assert_eq!(record.image, "https://image1.ljcdn.com/x/cover.jpg");
        assert_eq!(record.address, "川沙路88号");
        assert_eq!(record.description, "海上名邸，位于浦东川沙。近地铁、品牌房企");
        assert!(record.is_synthesized_location);
        assert_eq!(record.source_tag.to_string(), "root#pg1");
        assert_eq!(record.id, listing_id("海上名邸", "川沙路88号", "pudong"));
    }

    #[test]
    fn name_falls_back_to_title_attribute() {
        let parser = ListingParser::new(BASE).unwrap();
        let html = page(
            &[r#"<li class="resblock-list"><div class="resblock-name"><a title="绿地云都会" href="/x/"></a></div>
                <div class="resblock-location"><span>松江</span><span>泗泾</span></div></li>"#
                .to_string()],
            None,
        );
        let parsed = parser.parse(&html, "root", 1);
        let record = &parsed.records[0];
        assert_eq!(record.name, "绿地云都会");
        assert_eq!(record.district_slug, "songjiang");
        assert_eq!(record.address, "松江泗泾");
        assert_eq!(record.price, 0.0);
        assert!(record.features.is_empty());
        assert_eq!(
            record.image,
            "https://sh.fang.ke.com/static/images/loupan-placeholder.png"
        );
    }

    #[test]
    fn drops_unnamed_and_out_of_scope_listings() {
        let parser = ListingParser::new(BASE).unwrap();
        let unnamed = r#"<li class="resblock-list"><div class="resblock-location"><span>黄浦</span></div></li>"#;
        let html = page(
            &[
                listing("昆山花园", "昆山", "花桥", ""),
                unnamed.to_string(),
                listing("徐汇滨江", "徐汇", "滨江", ""),
            ],
            None,
        );
        let parsed = parser.parse(&html, "root", 1);
        assert_eq!(parsed.elements, 3);
        assert_eq!(parsed.out_of_scope, 1);
        assert_eq!(parsed.unnamed, 1);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].district_slug, "xuhui");
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let parser = ListingParser::new(BASE).unwrap();
        let parsed = parser.parse("<html><body><p>暂无数据</p></body></html>", "root", 7);
        assert_eq!(parsed.elements, 0);
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.total_count, None);
    }

    #[test]
    fn status_and_page_coordinates() {
        let parser = ListingParser::new(BASE).unwrap();
        let item = listing(
            "静安府",
            "静安",
            "大宁",
            r#"<span class="resblock-type">已售罄</span><div data-lat="31.27" data-lng="121.45"></div>"#,
        )
        .replace(r#"<span class="sale-status">在售</span>"#, "");
        let parsed = parser.parse(&page(&[item], None), "jingan", 2);
        let record = &parsed.records[0];
        assert_eq!(record.status, SaleStatus::SoldOut);
        assert_eq!(record.coordinates, Coordinates { lat: 31.27, lng: 121.45 });
        assert!(!record.is_synthesized_location);
    }

    #[test]
    fn unusable_page_coordinates_fall_back_to_synthesized() {
        let parser = ListingParser::new(BASE).unwrap();
        let items: Vec<String> = [
            r#"<div data-lat="NaN" data-lng="inf"></div>"#,
            r#"<div data-lat="131.2" data-lng="121.4"></div>"#,
            r#"<div data-lat="31.2" data-lng="-inf"></div>"#,
        ]
        .iter()
        .enumerate()
        .map(|(i, extra)| listing(&format!("楼盘{i}"), "长宁", "虹桥", extra))
        .collect();

        let parsed = parser.parse(&page(&items, None), "root", 1);

        assert_eq!(parsed.records.len(), 3);
        for record in &parsed.records {
            assert!(record.is_synthesized_location, "{}", record.name);
            assert_eq!(record.coordinates, synthesized_coordinates(&record.id));
            assert!(record.coordinates.lat.is_finite() && record.coordinates.lng.is_finite());
        }
    }

    #[test]
    fn image_urls_are_made_absolute() {
        let parser = ListingParser::new(BASE).unwrap();
        assert_eq!(
            parser.absolute_url("//img.ljcdn.com/a.jpg").unwrap(),
            "https://img.ljcdn.com/a.jpg"
        );
        assert_eq!(
            parser.absolute_url("/upload/b.png").unwrap(),
            "https://sh.fang.ke.com/upload/b.png"
        );
        assert_eq!(
            parser.absolute_url("http://cdn.example.com/c.jpg").unwrap(),
            "http://cdn.example.com/c.jpg"
        );
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price("12,345.6 元/㎡"), 12345.6);
        assert_eq!(parse_price("均价 58000 元/㎡"), 58000.0);
        assert_eq!(parse_price("总价 320-450 万/套"), 320.0);
        assert_eq!(parse_price("价格待定"), 0.0);
        assert_eq!(parse_price("约６万 58000元/㎡"), 58000.0);
        assert_eq!(parse_price(""), 0.0);
    }

    #[test]
    fn total_page_math() {
        assert_eq!(total_pages(Some(95), 10, 30), 10);
        assert_eq!(total_pages(Some(100), 10, 30), 10);
        assert_eq!(total_pages(Some(101), 10, 30), 11);
        assert_eq!(total_pages(Some(500), 10, 3), 3);
        assert_eq!(total_pages(Some(0), 10, 30), 1);
        assert_eq!(total_pages(Some(-4), 10, 30), 1);
        assert_eq!(total_pages(None, 10, 30), 1);
        assert_eq!(total_pages(Some(i64::MAX), 10, 30), 30);
        assert_eq!(total_pages(Some(i64::MAX), 1, u32::MAX), u32::MAX);
    }

    #[test]
    fn ids_and_synthetic_points_are_stable() {
        let a = listing_id("A", "X", "huangpu");
        assert_eq!(a, listing_id("A", "X", "huangpu"));
        assert_ne!(a, listing_id("A", "Y", "huangpu"));
        assert_ne!(listing_id("AX", "", "huangpu"), listing_id("A", "X", "huangpu"));

        let p = synthesized_coordinates(&a);
        assert_eq!(p, synthesized_coordinates(&a));
        assert!((p.lat - SHANGHAI_CENTER.lat).abs() <= LAT_SPREAD);
        assert!((p.lng - SHANGHAI_CENTER.lng).abs() <= LNG_SPREAD);
    }
}
