use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument};

use super::recruiting_247::split_school_meta;
use super::{SourceAdapter, SourceQuery, element_text, selector, trim_base};
use crate::error::FetchError;
use crate::http_client::{HeaderProfile, fetch_text};
use crate::record::{Dataset, RawRecord, RawStats};
use crate::stat_parse::extract_stat_from_text;

pub const NAME: &str = "maxpreps_text";
const TIMEOUT_SECS: u64 = 20;

// "Jane Doe, Lincoln (Portland, OR): 31.2 PPG, 8.1 RPG"
static LEADER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>[A-Z][A-Za-z'.\-]+(?:\s+[A-Z][A-Za-z'.\-]+){1,3})\s*(?:,\s*(?P<meta>[^:–—]+?))?\s*[:–—]\s*(?P<rest>.+)$",
    )
    .expect("static regex")
});

/// Fallback high-school source: free-text leader blurbs on the stat leaders
/// hub page, read with the "<number> PPG" heuristics.
#[derive(Debug, Clone)]
pub struct MaxPrepsText {
    base_url: String,
}

impl MaxPrepsText {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for MaxPrepsText {
    type Output = RawRecord;

    fn name(&self) -> &'static str {
        NAME
    }

    fn dataset(&self) -> Dataset {
        Dataset::HsStats
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    #[instrument(skip_all, fields(adapter = NAME))]
    async fn fetch(&self, query: &SourceQuery, client: &Client) -> Result<Vec<RawRecord>, FetchError> {
        let url = match query.state.as_deref() {
            Some(state) => format!(
                "{}/{}/basketball/stat-leaders/",
                trim_base(&self.base_url),
                state.to_ascii_lowercase()
            ),
            None => format!("{}/basketball/stat-leaders/", trim_base(&self.base_url)),
        };
        let html = fetch_text(client, NAME, &url, HeaderProfile::Html, self.timeout(), None).await?;
        let records = parse_leader_blurbs(&html)?;
        debug!(count = records.len(), "parsed maxpreps text blurbs");
        Ok(records)
    }
}

pub fn parse_leader_blurbs(raw: &str) -> Result<Vec<RawRecord>, FetchError> {
    let doc = Html::parse_document(raw);
    let blocks = selector(NAME, "li, p")?;
    let mut records = Vec::new();
    for block in doc.select(&blocks) {
        if let Some(record) = parse_leader_line(&element_text(&block)) {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn parse_leader_line(line: &str) -> Option<RawRecord> {
    let caps = LEADER_LINE_RE.captures(line.trim())?;
    let rest = caps.name("rest")?.as_str();
    let stat = |abbrev: &str| Some(extract_stat_from_text(rest, abbrev)).filter(|v| *v > 0.0);
    let stats = RawStats {
        games: stat("gp"),
        points: stat("ppg"),
        rebounds: stat("rpg"),
        assists: stat("apg"),
        steals: stat("spg"),
        blocks: stat("bpg"),
        ..RawStats::default()
    };
    if stats.is_empty() {
        return None;
    }
    let (team, home_town, home_state) = caps
        .name("meta")
        .map(|m| split_school_meta(m.as_str()))
        .unwrap_or((None, None, None));

    Some(RawRecord {
        name: caps.name("name").map(|m| m.as_str().to_string()),
        team,
        home_town,
        home_state,
        home_country: Some("USA".to_string()),
        league: Some("High School".to_string()),
        league_type: Some("HS".to_string()),
        stats,
        ..RawRecord::default()
    })
}
