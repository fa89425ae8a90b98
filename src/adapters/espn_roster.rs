use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{SourceAdapter, SourceQuery, pick_f64, pick_string, trim_base};
use crate::error::FetchError;
use crate::http_client::fetch_json;
use crate::record::{Dataset, RawRecord};
use crate::stat_parse::{parse_height, parse_weight};

pub const NAME: &str = "espn_roster";
const TIMEOUT_SECS: u64 = 15;
const ROSTER_PATH: &str = "/apis/site/v2/sports/basketball/mens-college-basketball/teams";

/// Primary roster source: ESPN's site API team roster document.
#[derive(Debug, Clone)]
pub struct EspnRoster {
    base_url: String,
    team_id: String,
}

impl EspnRoster {
    pub fn new(base_url: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            team_id: team_id.into(),
        }
    }

    fn url(&self, team: &str) -> String {
        format!("{}{ROSTER_PATH}/{team}/roster", trim_base(&self.base_url))
    }
}

#[async_trait]
impl SourceAdapter for EspnRoster {
    type Output = RawRecord;

    fn name(&self) -> &'static str {
        NAME
    }

    fn dataset(&self) -> Dataset {
        Dataset::Roster
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    #[instrument(skip_all, fields(adapter = NAME))]
    async fn fetch(&self, query: &SourceQuery, client: &Client) -> Result<Vec<RawRecord>, FetchError> {
        let team = query.team.as_deref().unwrap_or(&self.team_id);
        let root = fetch_json(client, NAME, &self.url(team), self.timeout()).await?;
        let records = parse_espn_roster(&root)?;
        debug!(count = records.len(), "parsed espn roster");
        Ok(records)
    }
}

pub fn parse_espn_roster_json(raw: &str) -> Result<Vec<RawRecord>, FetchError> {
    let root: Value = serde_json::from_str(raw.trim())
        .map_err(|err| FetchError::terminal(NAME, format!("invalid roster json: {err}")))?;
    parse_espn_roster(&root)
}

pub fn parse_espn_roster(root: &Value) -> Result<Vec<RawRecord>, FetchError> {
    let athletes = athlete_list(root)
        .ok_or_else(|| FetchError::terminal(NAME, "roster json has no athletes array"))?;
    let team_name = root
        .get("team")
        .and_then(|team| pick_string(team, &["displayName", "name", "location"]));

    Ok(athletes
        .iter()
        .map(|athlete| parse_athlete(athlete, team_name.as_deref()))
        .collect())
}

// Athletes come either flat or grouped by position (`[{ "items": [...] }]`).
fn athlete_list(root: &Value) -> Option<Vec<&Value>> {
    let arr = root.get("athletes")?.as_array()?;
    let mut out = Vec::new();
    for entry in arr {
        match entry.get("items").and_then(|items| items.as_array()) {
            Some(items) => out.extend(items.iter()),
            None => out.push(entry),
        }
    }
    Some(out)
}

fn parse_athlete(athlete: &Value, team_name: Option<&str>) -> RawRecord {
    let position = athlete
        .get("position")
        .and_then(|p| pick_string(p, &["abbreviation", "displayName", "name"]));
    let height = athlete
        .get("displayHeight")
        .and_then(|v| v.as_str())
        .and_then(parse_height)
        .or_else(|| pick_f64(athlete, &["height"]).map(|h| h.round() as u32))
        .filter(|h| *h > 0);
    let weight = athlete
        .get("displayWeight")
        .and_then(|v| v.as_str())
        .and_then(parse_weight)
        .or_else(|| pick_f64(athlete, &["weight"]).map(|w| w.round() as u32))
        .filter(|w| *w > 0);
    let class_year = athlete
        .get("experience")
        .and_then(|e| pick_string(e, &["displayValue", "abbreviation"]));
    let birth_place = athlete.get("birthPlace");
    let photo_url = athlete
        .get("headshot")
        .and_then(|h| pick_string(h, &["href"]));

    RawRecord {
        name: pick_string(athlete, &["fullName", "displayName"]),
        source_id: pick_string(athlete, &["id"]),
        position,
        height,
        weight,
        team: team_name.map(str::to_string),
        league: Some("NCAA".to_string()),
        league_type: Some("NCAA".to_string()),
        class_year,
        home_town: birth_place.and_then(|b| pick_string(b, &["city"])),
        home_state: birth_place.and_then(|b| pick_string(b, &["state"])),
        home_country: birth_place.and_then(|b| pick_string(b, &["country"])),
        photo_url,
        ..RawRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::parse_espn_roster_json;
    use crate::error::FetchErrorKind;

    #[test]
    fn grouped_athletes_are_flattened() {
        let raw = r#"{"team":{"displayName":"Duke Blue Devils"},
            "athletes":[{"position":"Guards","items":[{"id":"1","fullName":"A One"}]},
                        {"position":"Forwards","items":[{"id":"2","fullName":"B Two"}]}]}"#;
        let records = parse_espn_roster_json(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].team.as_deref(), Some("Duke Blue Devils"));
    }

    #[test]
    fn missing_athletes_is_terminal() {
        let err = parse_espn_roster_json(r#"{"team":{}}"#).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Terminal);
    }
}
