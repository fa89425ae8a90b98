use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{RecordEnricher, trim_base};
use crate::error::FetchError;
use crate::http_client::fetch_json;
use crate::record::{RawRecord, RawStats};
use crate::stat_parse::{parse_percentage, parse_stat};

pub const NAME: &str = "espn_athlete_stats";
const TIMEOUT_SECS: u64 = 10;
const STATS_PATH: &str = "/apis/common/v3/sports/basketball/mens-college-basketball/athletes";

/// Per-athlete season averages, overlaid on roster rows that carry an ESPN id.
#[derive(Debug, Clone)]
pub struct EspnAthleteStats {
    base_url: String,
}

impl EspnAthleteStats {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RecordEnricher for EspnAthleteStats {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn enrich(&self, mut record: RawRecord, client: &Client) -> Result<RawRecord, FetchError> {
        let Some(id) = record.source_id.clone() else {
            return Ok(record);
        };
        let url = format!("{}{STATS_PATH}/{id}/stats", trim_base(&self.base_url));
        let root = fetch_json(client, NAME, &url, Duration::from_secs(TIMEOUT_SECS)).await?;
        if let Some(stats) = parse_athlete_averages(&root) {
            record.stats.overlay(&stats);
        }
        Ok(record)
    }
}

/// Latest season row of the "averages" category, mapped by column label.
pub fn parse_athlete_averages(root: &Value) -> Option<RawStats> {
    let category = root
        .get("categories")?
        .as_array()?
        .iter()
        .find(|c| {
            c.get("name")
                .and_then(|n| n.as_str())
                .is_some_and(|n| n.eq_ignore_ascii_case("averages"))
        })?;
    let labels: Vec<String> = category
        .get("labels")?
        .as_array()?
        .iter()
        .map(|l| l.as_str().unwrap_or_default().to_ascii_uppercase())
        .collect();
    let latest = category.get("statistics")?.as_array()?.last()?;
    let values: Vec<String> = latest
        .get("stats")?
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
        .collect();

    let value_of = |label: &str| {
        labels
            .iter()
            .position(|l| l == label)
            .and_then(|idx| values.get(idx).cloned())
    };
    let stat = |label: &str| value_of(label).map(|v| parse_stat(&v));
    let pct = |label: &str| value_of(label).map(|v| parse_percentage(&v));

    let stats = RawStats {
        games: stat("GP"),
        minutes: stat("MIN"),
        points: stat("PTS"),
        rebounds: stat("REB"),
        assists: stat("AST"),
        steals: stat("STL"),
        blocks: stat("BLK"),
        field_goal_pct: pct("FG%"),
        three_point_pct: pct("3P%"),
        free_throw_pct: pct("FT%"),
    };
    (!stats.is_empty()).then_some(stats)
}
