//! Slug derivation for posts and pages: lowercase ASCII with hyphen-separated
//! words, stable for any Unicode title input.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static EDGE_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^-+|-+$)").unwrap());

/// Derive a URL slug from a title. Unicode input is NFKD-decomposed first so
/// accented characters reduce to their ASCII base letters before filtering.
pub fn slugify(title: &str) -> String {
    let decomposed: String = title.nfkd().filter(|c| c.is_ascii()).collect();
    let lowered = decomposed.to_lowercase();
    let hyphenated = NON_ALNUM.replace_all(&lowered, "-");
    EDGE_HYPHENS.replace_all(&hyphenated, "").to_string()
}
