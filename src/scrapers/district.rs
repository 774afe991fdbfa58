//! Shanghai district name normalisation and the geographic scope filter.

/// Slug used when district text normalises to nothing
pub const UNKNOWN_DISTRICT: &str = "unknown";

/// The 16 Shanghai administrative districts, Chinese name (without the
/// trailing 区) to slug.
pub const DISTRICTS: [(&str, &str); 16] = [
    ("黄浦", "huangpu"),
    ("徐汇", "xuhui"),
    ("长宁", "changning"),
    ("静安", "jingan"),
    ("普陀", "putuo"),
    ("虹口", "hongkou"),
    ("杨浦", "yangpu"),
    ("闵行", "minhang"),
    ("宝山", "baoshan"),
    ("嘉定", "jiading"),
    ("浦东", "pudong"),
    ("金山", "jinshan"),
    ("松江", "songjiang"),
    ("青浦", "qingpu"),
    ("奉贤", "fengxian"),
    ("崇明", "chongming"),
];

/// All known district slugs, in table order
pub fn known_slugs() -> impl Iterator<Item = &'static str> {
    DISTRICTS.iter().map(|(_, slug)| *slug)
}

/// Normalise raw district text to a slug.
///
/// "浦东新区" and "浦东" both give "pudong". Unknown names fall back to the
/// lower-cased stripped text, and empty input to [`UNKNOWN_DISTRICT`].
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_suffix("新区")
        .or_else(|| trimmed.strip_suffix('区'))
        .unwrap_or(trimmed)
        .trim();

    if let Some((_, slug)) = DISTRICTS.iter().find(|(name, _)| *name == stripped) {
        return (*slug).to_string();
    }

    let fallback = stripped.to_lowercase();
    if fallback.is_empty() {
        UNKNOWN_DISTRICT.to_string()
    } else {
        fallback
    }
}

/// Whether a slug is one of the 16 Shanghai districts
pub fn is_known_slug(slug: &str) -> bool {
    known_slugs().any(|known| known == slug)
}

/// Whether raw district text resolves to a Shanghai district
pub fn is_in_scope(raw: &str) -> bool {
    is_known_slug(&normalize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_normalizes_with_and_without_suffix() {
        for (name, slug) in DISTRICTS {
            assert_eq!(normalize(name), slug);
            assert_eq!(normalize(&format!("{name}区")), slug);
            assert!(is_in_scope(&format!("{name}区")));
        }
    }

    #[test]
    fn pudong_new_area_suffix() {
        assert_eq!(normalize("浦东新区"), "pudong");
        assert_eq!(normalize("  黄浦区 "), "huangpu");
    }

    #[test]
    fn unknown_names_fall_back_to_lowercase() {
        assert_eq!(normalize("北京"), "北京");
        assert_eq!(normalize("Kunshan区"), "kunshan");
        assert!(!is_in_scope("北京"));
        assert!(!is_in_scope("昆山"));
    }

    #[test]
    fn empty_input_is_unknown() {
        assert_eq!(normalize(""), UNKNOWN_DISTRICT);
        assert_eq!(normalize("区"), UNKNOWN_DISTRICT);
        assert!(!is_in_scope("   "));
    }

    #[test]
    fn exactly_sixteen_slugs() {
        assert_eq!(known_slugs().count(), 16);
        assert!(is_known_slug("huangpu"));
        assert!(!is_known_slug(UNKNOWN_DISTRICT));
    }
}
