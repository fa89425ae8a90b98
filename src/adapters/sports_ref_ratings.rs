use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument};

use super::{SourceAdapter, SourceQuery, element_text, selector, trim_base};
use crate::error::FetchError;
use crate::http_client::{HeaderProfile, fetch_text};
use crate::normalize::normalize_name;
use crate::record::{Dataset, TeamRating};
use crate::stat_parse::parse_number;

pub const NAME: &str = "sports_ref_ratings";
const TIMEOUT_SECS: u64 = 15;

/// Season SRS ratings table from Sports-Reference.
#[derive(Debug, Clone)]
pub struct SportsRefRatings {
    base_url: String,
    season: u16,
}

impl SportsRefRatings {
    pub fn new(base_url: impl Into<String>, season: u16) -> Self {
        Self {
            base_url: base_url.into(),
            season,
        }
    }
}

#[async_trait]
impl SourceAdapter for SportsRefRatings {
    type Output = TeamRating;

    fn name(&self) -> &'static str {
        NAME
    }

    fn dataset(&self) -> Dataset {
        Dataset::TeamRating
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    #[instrument(skip_all, fields(adapter = NAME))]
    async fn fetch(&self, query: &SourceQuery, client: &Client) -> Result<Vec<TeamRating>, FetchError> {
        let team = query
            .team
            .as_deref()
            .ok_or_else(|| FetchError::terminal(NAME, "team name required"))?;
        let url = format!(
            "{}/cbb/seasons/men/{}-ratings.html",
            trim_base(&self.base_url),
            self.season
        );
        let html = fetch_text(client, NAME, &url, HeaderProfile::Html, self.timeout(), None).await?;
        let all = parse_ratings_table(&html)?;
        let matched = find_team(&all, team).into_iter().cloned().collect::<Vec<_>>();
        debug!(rows = all.len(), matched = matched.len(), "parsed ratings table");
        Ok(matched)
    }
}

pub fn parse_ratings_table(raw: &str) -> Result<Vec<TeamRating>, FetchError> {
    let uncommented = raw.replace("<!--", "").replace("-->", "");
    let doc = Html::parse_document(&uncommented);
    let table = selector(NAME, "table#ratings")?;
    let rows = selector(NAME, "table#ratings tbody tr")?;
    let cell = selector(NAME, "th[data-stat], td[data-stat]")?;

    if doc.select(&table).next().is_none() {
        return Err(FetchError::terminal(NAME, "ratings table not found"));
    }

    let mut out = Vec::new();
    for row in doc.select(&rows) {
        if row.value().attr("class").is_some_and(|c| c.contains("thead")) {
            continue;
        }
        let cells: HashMap<&str, String> = row
            .select(&cell)
            .filter_map(|c| Some((c.value().attr("data-stat")?, element_text(&c))))
            .collect();
        let Some(team) = cells.get("school_name").filter(|t| !t.is_empty()) else {
            continue;
        };
        let number = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| cells.get(*k))
                .map(|v| parse_number(v))
                .unwrap_or(0.0)
        };
        out.push(TeamRating {
            team: team.clone(),
            ranking: cells.get("ranker").and_then(|r| r.trim().parse::<u32>().ok()),
            rating: number(&["srs"]),
            offense: number(&["off_rtg", "osrs"]),
            defense: number(&["def_rtg", "dsrs"]),
            conference: cells.get("conf_abbr").filter(|c| !c.is_empty()).cloned(),
        });
    }
    Ok(out)
}

/// Exact normalized match first, then a prefix match ("Duke" vs "Duke Blue Devils").
pub fn find_team<'a>(ratings: &'a [TeamRating], team: &str) -> Option<&'a TeamRating> {
    let wanted = normalize_name(&team.replace(['-', '_'], " "));
    if wanted.is_empty() {
        return None;
    }
    ratings
        .iter()
        .find(|r| normalize_name(&r.team) == wanted)
        .or_else(|| {
            ratings.iter().find(|r| {
                let name = normalize_name(&r.team);
                name.starts_with(&format!("{wanted} ")) || wanted.starts_with(&format!("{name} "))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::find_team;
    use crate::record::TeamRating;

    fn rating(team: &str) -> TeamRating {
        TeamRating {
            team: team.to_string(),
            ranking: None,
            rating: 0.0,
            offense: 0.0,
            defense: 0.0,
            conference: None,
        }
    }

    #[test]
    fn team_lookup_prefers_exact() {
        let rows = vec![rating("North Carolina State"), rating("North Carolina")];
        assert_eq!(find_team(&rows, "north-carolina").unwrap().team, "North Carolina");
        assert_eq!(find_team(&rows, "North").map(|r| r.team.as_str()), Some("North Carolina State"));
        assert!(find_team(&rows, "Duke").is_none());
    }
}
