use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument};

use super::recruiting_247::split_school_meta;
use super::{SourceAdapter, SourceQuery, element_text, select_text, selector, trim_base};
use crate::error::FetchError;
use crate::http_client::{HeaderProfile, fetch_text};
use crate::record::{Dataset, RawRecord, RawStats};
use crate::stat_parse::{parse_percentage, parse_stat};

pub const NAME: &str = "maxpreps_leaders";
const TIMEOUT_SECS: u64 = 20;

static ATHLETE_META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\((?P<class>(?i:fr|so|jr|sr))\.?\)(?:\s*(?P<pos>[A-Z]{1,2}(?:/[A-Z]{1,2})?)\b)?",
    )
    .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    School,
    Class,
    Position,
    Games,
    Minutes,
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    FieldGoalPct,
    ThreePointPct,
    FreeThrowPct,
}

/// High-school stat leaders table from MaxPreps. Columns are located by
/// header text since the leaderboards reorder them per stat category.
#[derive(Debug, Clone)]
pub struct MaxPrepsLeaders {
    base_url: String,
    default_state: Option<String>,
}

impl MaxPrepsLeaders {
    pub fn new(base_url: impl Into<String>, default_state: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_state,
        }
    }

    pub(crate) fn url(base_url: &str, state: Option<&str>) -> String {
        match state {
            Some(state) => format!(
                "{}/{}/basketball/stat-leaders/scoring/ppg/",
                trim_base(base_url),
                state.to_ascii_lowercase()
            ),
            None => format!("{}/basketball/stat-leaders/scoring/ppg/", trim_base(base_url)),
        }
    }
}

#[async_trait]
impl SourceAdapter for MaxPrepsLeaders {
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
        let state = query.state.as_deref().or(self.default_state.as_deref());
        let url = Self::url(&self.base_url, state);
        let html = fetch_text(client, NAME, &url, HeaderProfile::Html, self.timeout(), None).await?;
        let records = parse_maxpreps_leaders(&html)?;
        debug!(count = records.len(), "parsed maxpreps leaders");
        Ok(records)
    }
}

pub fn parse_maxpreps_leaders(raw: &str) -> Result<Vec<RawRecord>, FetchError> {
    let doc = Html::parse_document(raw);
    let table_sel = selector(NAME, "table")?;
    let header_sel = selector(NAME, "thead th")?;
    let row_sel = selector(NAME, "tbody tr")?;
    let cell_sel = selector(NAME, "td, th")?;
    let link_sel = selector(NAME, "a")?;

    // First table whose header names an athlete column.
    let Some((table, columns)) = doc.select(&table_sel).find_map(|table| {
        let columns: Vec<Option<Column>> = table
            .select(&header_sel)
            .map(|th| column_for_header(&element_text(&th)))
            .collect();
        columns
            .contains(&Some(Column::Name))
            .then_some((table, columns))
    }) else {
        return Err(FetchError::terminal(NAME, "leaders table not found"));
    };

    let mut records = Vec::new();
    for row in table.select(&row_sel) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.is_empty() {
            continue;
        }
        let mut record = RawRecord {
            league: Some("High School".to_string()),
            league_type: Some("HS".to_string()),
            home_country: Some("USA".to_string()),
            ..RawRecord::default()
        };
        let mut stats = RawStats::default();
        for (cell, column) in cells.iter().zip(columns.iter()) {
            let Some(column) = column else {
                continue;
            };
            let text = element_text(cell);
            match column {
                Column::Name => {
                    let meta = ATHLETE_META_RE.captures(&text);
                    // Without a link the name is whatever precedes "(Sr.) G".
                    record.name = select_text(cell, &link_sel).or_else(|| {
                        let end = meta
                            .as_ref()
                            .and_then(|caps| caps.get(0))
                            .map_or(text.len(), |m| m.start());
                        Some(text[..end].trim().to_string())
                    });
                    if let Some(caps) = meta {
                        record.class_year = caps.name("class").map(|m| m.as_str().to_string());
                        record.position = caps.name("pos").map(|m| m.as_str().to_string());
                    }
                }
                Column::School => {
                    let (school, town, state) = split_school_meta(&text);
                    record.team = school;
                    record.home_town = town;
                    record.home_state = state;
                }
                Column::Class => record.class_year = Some(text).filter(|t| !t.is_empty()),
                Column::Position => record.position = Some(text).filter(|t| !t.is_empty()),
                Column::Games => stats.games = Some(parse_stat(&text)),
                Column::Minutes => stats.minutes = Some(parse_stat(&text)),
                Column::Points => stats.points = Some(parse_stat(&text)),
                Column::Rebounds => stats.rebounds = Some(parse_stat(&text)),
                Column::Assists => stats.assists = Some(parse_stat(&text)),
                Column::Steals => stats.steals = Some(parse_stat(&text)),
                Column::Blocks => stats.blocks = Some(parse_stat(&text)),
                Column::FieldGoalPct => stats.field_goal_pct = Some(parse_percentage(&text)),
                Column::ThreePointPct => stats.three_point_pct = Some(parse_percentage(&text)),
                Column::FreeThrowPct => stats.free_throw_pct = Some(parse_percentage(&text)),
            }
        }
        record.stats = stats;
        records.push(record);
    }
    Ok(records)
}

fn column_for_header(header: &str) -> Option<Column> {
    let h = header.trim().to_ascii_lowercase();
    let column = match h.as_str() {
        "athlete" | "athlete name" | "name" | "player" => Column::Name,
        "school" | "team" => Column::School,
        "class" | "yr" | "gr" | "grade" => Column::Class,
        "pos" | "position" => Column::Position,
        "gp" | "g" | "games" => Column::Games,
        "mpg" | "min/g" => Column::Minutes,
        "ppg" | "pts/g" => Column::Points,
        "rpg" | "reb/g" => Column::Rebounds,
        "apg" | "ast/g" => Column::Assists,
        "spg" | "stl/g" => Column::Steals,
        "bpg" | "blk/g" => Column::Blocks,
        "fg%" | "fg pct" => Column::FieldGoalPct,
        "3p%" | "3pt%" | "3fg%" => Column::ThreePointPct,
        "ft%" | "ft pct" => Column::FreeThrowPct,
        _ => return None,
    };
    Some(column)
}

#[cfg(test)]
mod tests {
    use super::{Column, MaxPrepsLeaders, column_for_header, parse_maxpreps_leaders};

    #[test]
    fn headers_map_to_columns() {
        assert_eq!(column_for_header(" Athlete Name "), Some(Column::Name));
        assert_eq!(column_for_header("PPG"), Some(Column::Points));
        assert_eq!(column_for_header("3P%"), Some(Column::ThreePointPct));
        assert_eq!(column_for_header("#"), None);
    }

    #[test]
    fn url_with_and_without_state() {
        assert_eq!(
            MaxPrepsLeaders::url("https://www.maxpreps.com/", Some("TX")),
            "https://www.maxpreps.com/tx/basketball/stat-leaders/scoring/ppg/"
        );
        assert_eq!(
            MaxPrepsLeaders::url("https://www.maxpreps.com", None),
            "https://www.maxpreps.com/basketball/stat-leaders/scoring/ppg/"
        );
    }

    #[test]
    fn athlete_meta_only_takes_uppercase_positions() {
        let html = r#"<table>
            <thead><tr><th>Athlete</th><th>School</th><th>PPG</th></tr></thead>
            <tbody>
              <tr><td>Jane Doe (Sr.) guard</td><td>Westlake</td><td>21.0</td></tr>
              <tr><td>Maya Cole (jr) F/C</td><td>Duncanville</td><td>18.5</td></tr>
            </tbody>
        </table>"#;
        let rows = parse_maxpreps_leaders(html).unwrap();
        assert_eq!(rows[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(rows[0].class_year.as_deref(), Some("Sr"));
        assert_eq!(rows[0].position, None);
        assert_eq!(rows[1].name.as_deref(), Some("Maya Cole"));
        assert_eq!(rows[1].class_year.as_deref(), Some("jr"));
        assert_eq!(rows[1].position.as_deref(), Some("F/C"));
    }
}
