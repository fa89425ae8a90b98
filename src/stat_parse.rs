use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::clean_text;

static HEIGHT_FEET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*'\s*(\d{1,2})\s*(?:"|'')?"#).expect("static regex"));
static HEIGHT_DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d)\s*-\s*(\d{1,2})\b").expect("static regex"));
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?(?:\d+(?:\.\d+)?|\.\d+)").expect("static regex"));

/// Height in inches from `6'8"` or `6-8`; `None` when neither pattern matches.
pub fn parse_height(text: &str) -> Option<u32> {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return None;
    }
    let caps = HEIGHT_FEET_RE
        .captures(&cleaned)
        .or_else(|| HEIGHT_DASH_RE.captures(&cleaned))?;
    let feet: u32 = caps.get(1)?.as_str().parse().ok()?;
    let inches: u32 = caps.get(2)?.as_str().parse().ok()?;
    if inches >= 12 {
        return None;
    }
    feet.checked_mul(12)?.checked_add(inches)
}

/// Weight in pounds: the first integer in the text.
pub fn parse_weight(text: &str) -> Option<u32> {
    INTEGER_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|w| *w > 0)
}

/// Finds `<number><optional space><abbrev>` case-insensitively, e.g. `24.1 ppg`.
pub fn extract_stat_from_text(text: &str, stat_abbrev: &str) -> f64 {
    let abbrev = stat_abbrev.trim();
    if text.is_empty() || abbrev.is_empty() {
        return 0.0;
    }
    let pattern = format!(r"(?i)(\d+(?:\.\d+)?)\s*{}\b", regex::escape(abbrev));
    let Ok(re) = Regex::new(&pattern) else {
        return 0.0;
    };
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// First signed decimal in the text, `0.0` when there is none.
pub fn parse_number(text: &str) -> f64 {
    let cleaned = text.replace(',', "");
    NUMBER_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Non-negative per-game stat value.
pub fn parse_stat(text: &str) -> f64 {
    parse_number(text).max(0.0)
}

/// Percentage as a 0-1 fraction: `"45.2"`, `"45.2%"` and `".452"` all give 0.452.
pub fn parse_percentage(text: &str) -> f64 {
    let value = parse_stat(text);
    let pct = if text.contains('%') || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    pct.clamp(0.0, 1.0)
}
