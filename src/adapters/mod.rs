//! One module per external source. Each adapter fetches a page or API
//! document and hands back whatever it could extract; it never validates.
//! Parsing lives in a pure `parse_*` function per source so a layout change
//! on one site stays inside its module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Selector};
use serde_json::Value;

use crate::error::FetchError;
use crate::normalize::clean_text;
use crate::record::{Dataset, RawRecord};

pub mod espn_athlete_stats;
pub mod espn_roster;
pub mod maxpreps_leaders;
pub mod maxpreps_text;
pub mod on3_rankings;
pub mod recruiting_247;
pub mod sports_ref_ratings;
pub mod sports_ref_roster;

/// Per-request parameters. Adapters fall back to their configured defaults
/// for anything left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceQuery {
    pub class_year: Option<u16>,
    pub team: Option<String>,
    pub state: Option<String>,
}

impl SourceQuery {
    pub fn for_class(class_year: u16) -> Self {
        Self {
            class_year: Some(class_year),
            ..Self::default()
        }
    }

    pub fn for_team(team: impl Into<String>) -> Self {
        Self {
            team: Some(team.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    fn dataset(&self) -> Dataset;

    fn timeout(&self) -> Duration;

    async fn fetch(
        &self,
        query: &SourceQuery,
        client: &Client,
    ) -> Result<Vec<Self::Output>, FetchError>;
}

/// Deeper per-record fetch run after a dataset list is known.
#[async_trait]
pub trait RecordEnricher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn enrich(&self, record: RawRecord, client: &Client) -> Result<RawRecord, FetchError>;
}

pub(crate) fn selector(source: &str, css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css)
        .map_err(|err| FetchError::terminal(source, format!("bad selector {css}: {err}")))
}

pub(crate) fn element_text(element: &ElementRef) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn select_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|text| !text.is_empty())
}

pub(crate) fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        let Some(found) = value.get(*key) else {
            continue;
        };
        let text = match found {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

pub(crate) fn pick_f64(value: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match value.get(*key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(parsed) = s.trim().parse::<f64>() {
                    return Some(parsed);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits `"City, ST"` into its parts.
pub(crate) fn split_hometown(raw: &str) -> (Option<String>, Option<String>) {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return (None, None);
    }
    match cleaned.rsplit_once(',') {
        Some((town, state)) => (
            Some(town.trim().to_string()).filter(|s| !s.is_empty()),
            Some(state.trim().to_string()).filter(|s| !s.is_empty()),
        ),
        None => (Some(cleaned), None),
    }
}

pub(crate) fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::split_hometown;

    #[test]
    fn hometown_split() {
        assert_eq!(
            split_hometown("Montverde, FL"),
            (Some("Montverde".to_string()), Some("FL".to_string()))
        );
        assert_eq!(
            split_hometown("St. Louis, Mo., USA"),
            (Some("St. Louis, Mo.".to_string()), Some("USA".to_string()))
        );
        assert_eq!(split_hometown("Toronto"), (Some("Toronto".to_string()), None));
        assert_eq!(split_hometown(" "), (None, None));
    }
}
