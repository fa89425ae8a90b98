use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

const GENERIC_AFFILIATIONS: &[&str] = &["", "n/a", "na", "tbd", "unknown", "none", "-", "--"];

/// Collapses runs of whitespace (including NBSP) and drops leftover markup.
pub fn clean_text(raw: &str) -> String {
    let without_tags = if raw.contains('<') {
        TAG_RE.replace_all(raw, " ").into_owned()
    } else {
        raw.to_string()
    };
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    decoded
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_name(raw: &str) -> String {
    clean_text(raw).to_lowercase()
}

/// Team/school values that carry no identity ("N/A", "TBD", ...).
pub fn is_generic_affiliation(raw: &str) -> bool {
    let normalized = normalize_name(raw);
    GENERIC_AFFILIATIONS.contains(&normalized.as_str())
}

/// Stable identifier for a player name: `h = h * 31 + c` over UTF-16 code
/// units with wrapping 32-bit arithmetic, then the absolute value.
pub fn derive_id(name: &str) -> u32 {
    let normalized = normalize_name(name);
    let mut hash: i32 = 0;
    for unit in normalized.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}
