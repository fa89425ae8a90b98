use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument};

use super::{SourceAdapter, SourceQuery, element_text, selector, split_hometown, trim_base};
use crate::error::FetchError;
use crate::http_client::{HeaderProfile, fetch_text};
use crate::normalize::normalize_name;
use crate::record::{Dataset, RawRecord, RawStats};
use crate::stat_parse::{parse_height, parse_percentage, parse_stat, parse_weight};

pub const NAME: &str = "sports_ref_roster";
const TIMEOUT_SECS: u64 = 20;

/// Secondary roster source: a Sports-Reference school season page.
#[derive(Debug, Clone)]
pub struct SportsRefRoster {
    base_url: String,
    school_slug: String,
    season: u16,
}

impl SportsRefRoster {
    pub fn new(base_url: impl Into<String>, school_slug: impl Into<String>, season: u16) -> Self {
        Self {
            base_url: base_url.into(),
            school_slug: school_slug.into(),
            season,
        }
    }

    fn url(&self, slug: &str) -> String {
        format!(
            "{}/cbb/schools/{slug}/men/{}.html",
            trim_base(&self.base_url),
            self.season
        )
    }
}

#[async_trait]
impl SourceAdapter for SportsRefRoster {
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
        let slug = query.team.as_deref().unwrap_or(&self.school_slug);
        let url = self.url(slug);
        let html = fetch_text(client, NAME, &url, HeaderProfile::Html, self.timeout(), None).await?;
        let records = parse_sports_ref_roster(&html, slug)?;
        debug!(count = records.len(), "parsed sports-reference roster");
        Ok(records)
    }
}

/// Roster table joined with the per-game table by player name. Some tables
/// ship inside HTML comments, so comment markers are dropped before parsing.
pub fn parse_sports_ref_roster(raw: &str, fallback_team: &str) -> Result<Vec<RawRecord>, FetchError> {
    let uncommented = raw.replace("<!--", "").replace("-->", "");
    let doc = Html::parse_document(&uncommented);

    let roster_table = selector(NAME, "table#roster")?;
    let roster_rows = selector(NAME, "table#roster tbody tr")?;
    let per_game_rows = selector(NAME, "table#players_per_game tbody tr, table#per_game tbody tr")?;
    let cell = selector(NAME, "th[data-stat], td[data-stat]")?;
    let team_sel = selector(NAME, "div#meta h1 span")?;

    if doc.select(&roster_table).next().is_none() {
        return Err(FetchError::terminal(NAME, "roster table not found"));
    }
    let team = team_name(&doc, &team_sel).unwrap_or_else(|| title_case_slug(fallback_team));

    let mut per_game: HashMap<String, RawStats> = HashMap::new();
    for row in doc.select(&per_game_rows) {
        let cells = row_cells(&row, &cell);
        let Some(name) = cells
            .get("player")
            .or_else(|| cells.get("name_display"))
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        per_game.insert(normalize_name(name), stats_from_cells(&cells));
    }

    let mut records = Vec::new();
    for row in doc.select(&roster_rows) {
        if row.value().attr("class").is_some_and(|c| c.contains("thead")) {
            continue;
        }
        let cells = row_cells(&row, &cell);
        let name = cells.get("player").cloned();
        let (home_town, home_state) = cells
            .get("hometown")
            .map(|h| split_hometown(h))
            .unwrap_or((None, None));
        let stats = name
            .as_deref()
            .and_then(|n| per_game.get(&normalize_name(n)))
            .cloned()
            .unwrap_or_default();

        records.push(RawRecord {
            name,
            position: cells.get("pos").cloned(),
            height: cells.get("height").and_then(|h| parse_height(h)),
            weight: cells.get("weight").and_then(|w| parse_weight(w)),
            team: Some(team.clone()),
            league: Some("NCAA".to_string()),
            league_type: Some("NCAA".to_string()),
            class_year: cells.get("class").cloned(),
            home_town,
            home_state,
            stats,
            ..RawRecord::default()
        });
    }

    Ok(records)
}

fn row_cells(row: &ElementRef, cell: &scraper::Selector) -> HashMap<String, String> {
    row.select(cell)
        .filter_map(|c| {
            let key = c.value().attr("data-stat")?;
            Some((key.to_string(), element_text(&c)))
        })
        .collect()
}

fn stats_from_cells(cells: &HashMap<String, String>) -> RawStats {
    let stat = |keys: &[&str]| keys.iter().find_map(|k| cells.get(*k)).map(|v| parse_stat(v));
    let pct = |keys: &[&str]| keys.iter().find_map(|k| cells.get(*k)).map(|v| parse_percentage(v));
    RawStats {
        games: stat(&["games", "g"]),
        minutes: stat(&["mp_per_g", "mp"]),
        points: stat(&["pts_per_g", "pts"]),
        rebounds: stat(&["trb_per_g", "trb"]),
        assists: stat(&["ast_per_g", "ast"]),
        steals: stat(&["stl_per_g", "stl"]),
        blocks: stat(&["blk_per_g", "blk"]),
        field_goal_pct: pct(&["fg_pct"]),
        three_point_pct: pct(&["fg3_pct"]),
        free_throw_pct: pct(&["ft_pct"]),
    }
}

fn team_name(doc: &Html, span: &scraper::Selector) -> Option<String> {
    let spans: Vec<String> = doc.select(span).map(|s| element_text(&s)).collect();
    spans.get(1).filter(|s| !s.is_empty()).cloned()
}

fn title_case_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{parse_sports_ref_roster, title_case_slug};

    #[test]
    fn slug_title_case() {
        assert_eq!(title_case_slug("north-carolina"), "North Carolina");
    }

    #[test]
    fn page_without_roster_table_is_terminal() {
        assert!(parse_sports_ref_roster("<html><body></body></html>", "duke").is_err());
    }
}
