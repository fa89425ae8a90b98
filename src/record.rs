use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::normalize::{clean_text, derive_id, is_generic_affiliation};

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Roster,
    Recruiting,
    HsStats,
    TeamRating,
}

impl Dataset {
    pub const PLAYER_DATASETS: [Dataset; 3] =
        [Dataset::Roster, Dataset::Recruiting, Dataset::HsStats];

    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Roster => "roster",
            Dataset::Recruiting => "recruiting",
            Dataset::HsStats => "hs_stats",
            Dataset::TeamRating => "team_rating",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-game numbers as a source reported them. `None` means the source had no
/// such column, which is different from a reported zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStats {
    pub games: Option<f64>,
    pub minutes: Option<f64>,
    pub points: Option<f64>,
    pub rebounds: Option<f64>,
    pub assists: Option<f64>,
    pub steals: Option<f64>,
    pub blocks: Option<f64>,
    pub field_goal_pct: Option<f64>,
    pub three_point_pct: Option<f64>,
    pub free_throw_pct: Option<f64>,
}

impl RawStats {
    pub fn is_empty(&self) -> bool {
        *self == RawStats::default()
    }

    /// Replaces every field the other side reports.
    pub fn overlay(&mut self, other: &RawStats) {
        fn take(dst: &mut Option<f64>, src: Option<f64>) {
            if src.is_some() {
                *dst = src;
            }
        }
        take(&mut self.games, other.games);
        take(&mut self.minutes, other.minutes);
        take(&mut self.points, other.points);
        take(&mut self.rebounds, other.rebounds);
        take(&mut self.assists, other.assists);
        take(&mut self.steals, other.steals);
        take(&mut self.blocks, other.blocks);
        take(&mut self.field_goal_pct, other.field_goal_pct);
        take(&mut self.three_point_pct, other.three_point_pct);
        take(&mut self.free_throw_pct, other.free_throw_pct);
    }
}

/// Best-effort record straight out of an adapter. Every field may be missing;
/// adapters never validate, callers decide what is usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub name: Option<String>,
    pub source_id: Option<String>,
    pub position: Option<String>,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    /// College for roster rows, high school for recruits and HS leaders.
    pub team: Option<String>,
    pub committed_to: Option<String>,
    pub league: Option<String>,
    pub league_type: Option<String>,
    pub class_year: Option<String>,
    pub home_town: Option<String>,
    pub home_state: Option<String>,
    pub home_country: Option<String>,
    pub photo_url: Option<String>,
    pub ranking: Option<String>,
    pub stars: Option<u8>,
    pub rating: Option<f64>,
    pub stats: RawStats,
}

impl RawRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn clean_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(clean_text)
            .filter(|name| !name.is_empty())
    }
}

/// Minimal structural check the fallback sequencer applies to adapter output.
pub trait Structured {
    fn is_structurally_valid(&self) -> bool;
}

impl Structured for RawRecord {
    fn is_structurally_valid(&self) -> bool {
        self.clean_name().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    pub player_id: u32,
    pub position: String,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub current_team: String,
    pub league: String,
    pub league_type: String,
    pub class_year: Option<String>,
    pub home_town: String,
    pub home_state: String,
    pub home_country: String,
    pub photo_url: Option<String>,
    pub ranking: String,
    pub stars: Option<u8>,
    pub recruit_rating: Option<f64>,
    pub committed_to: Option<String>,
    pub games: f64,
    pub minutes: f64,
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub steals: f64,
    pub blocks: f64,
    pub field_goal_pct: f64,
    pub three_point_pct: f64,
    pub free_throw_pct: f64,
    pub data_source: String,
    pub source_adapter: String,
    pub priority: u8,
}

impl PlayerRecord {
    /// Normalizes a raw record; `None` when it has no usable name.
    pub fn from_raw(
        raw: &RawRecord,
        dataset: Dataset,
        adapter: &str,
        priority: u8,
    ) -> Option<Self> {
        let name = raw.clean_name()?;
        let stats = &raw.stats;
        Some(Self {
            player_id: derive_id(&name),
            name,
            position: text_or_na(raw.position.as_deref()),
            height: raw.height,
            weight: raw.weight,
            current_team: text_or_na(raw.team.as_deref()),
            league: text_or_na(raw.league.as_deref()),
            league_type: text_or_na(raw.league_type.as_deref()),
            class_year: clean_opt(raw.class_year.as_deref()),
            home_town: text_or_na(raw.home_town.as_deref()),
            home_state: text_or_na(raw.home_state.as_deref()),
            home_country: text_or_na(raw.home_country.as_deref()),
            photo_url: clean_opt(raw.photo_url.as_deref()),
            ranking: text_or_na(raw.ranking.as_deref()),
            stars: raw.stars,
            recruit_rating: raw.rating,
            committed_to: clean_opt(raw.committed_to.as_deref()),
            games: stat_or_zero(stats.games),
            minutes: stat_or_zero(stats.minutes),
            points: stat_or_zero(stats.points),
            rebounds: stat_or_zero(stats.rebounds),
            assists: stat_or_zero(stats.assists),
            steals: stat_or_zero(stats.steals),
            blocks: stat_or_zero(stats.blocks),
            field_goal_pct: stat_or_zero(stats.field_goal_pct),
            three_point_pct: stat_or_zero(stats.three_point_pct),
            free_throw_pct: stat_or_zero(stats.free_throw_pct),
            data_source: dataset.as_str().to_string(),
            source_adapter: adapter.to_string(),
            priority,
        })
    }

    /// Field-level union: fills every empty field of `self` from `other`.
    /// Populated fields of `self` are never overwritten.
    pub fn absorb(&mut self, other: &PlayerRecord) {
        fill_text(&mut self.position, &other.position);
        fill_text(&mut self.current_team, &other.current_team);
        fill_text(&mut self.league, &other.league);
        fill_text(&mut self.league_type, &other.league_type);
        fill_text(&mut self.home_town, &other.home_town);
        fill_text(&mut self.home_state, &other.home_state);
        fill_text(&mut self.home_country, &other.home_country);
        fill_text(&mut self.ranking, &other.ranking);
        fill_opt(&mut self.height, &other.height);
        fill_opt(&mut self.weight, &other.weight);
        fill_opt(&mut self.class_year, &other.class_year);
        fill_opt(&mut self.photo_url, &other.photo_url);
        fill_opt(&mut self.stars, &other.stars);
        fill_opt(&mut self.recruit_rating, &other.recruit_rating);
        fill_opt(&mut self.committed_to, &other.committed_to);
        fill_num(&mut self.games, other.games);
        fill_num(&mut self.minutes, other.minutes);
        fill_num(&mut self.points, other.points);
        fill_num(&mut self.rebounds, other.rebounds);
        fill_num(&mut self.assists, other.assists);
        fill_num(&mut self.steals, other.steals);
        fill_num(&mut self.blocks, other.blocks);
        fill_num(&mut self.field_goal_pct, other.field_goal_pct);
        fill_num(&mut self.three_point_pct, other.three_point_pct);
        fill_num(&mut self.free_throw_pct, other.free_throw_pct);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitRecord {
    pub name: String,
    pub player_id: u32,
    pub ranking: String,
    pub position: String,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub school: String,
    pub committed_to: Option<String>,
    pub class_year: Option<String>,
    pub home_town: String,
    pub home_state: String,
    pub stars: Option<u8>,
    pub rating: Option<f64>,
    pub photo_url: Option<String>,
    pub data_source: String,
    pub source_adapter: String,
}

impl RecruitRecord {
    pub fn from_raw(raw: &RawRecord, adapter: &str) -> Option<Self> {
        let name = raw.clean_name()?;
        Some(Self {
            player_id: derive_id(&name),
            name,
            ranking: text_or_na(raw.ranking.as_deref()),
            position: text_or_na(raw.position.as_deref()),
            height: raw.height,
            weight: raw.weight,
            school: text_or_na(raw.team.as_deref()),
            committed_to: clean_opt(raw.committed_to.as_deref()),
            class_year: clean_opt(raw.class_year.as_deref()),
            home_town: text_or_na(raw.home_town.as_deref()),
            home_state: text_or_na(raw.home_state.as_deref()),
            stars: raw.stars,
            rating: raw.rating,
            photo_url: clean_opt(raw.photo_url.as_deref()),
            data_source: Dataset::Recruiting.as_str().to_string(),
            source_adapter: adapter.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRating {
    pub team: String,
    pub ranking: Option<u32>,
    pub rating: f64,
    pub offense: f64,
    pub defense: f64,
    pub conference: Option<String>,
}

impl Structured for TeamRating {
    fn is_structurally_valid(&self) -> bool {
        !self.team.trim().is_empty()
    }
}

/// Outcome of resolving one dataset through its fallback chain.
#[derive(Debug, Clone)]
pub struct SourceResult<T> {
    pub dataset: Dataset,
    pub records: Vec<T>,
    pub successful_adapter: Option<String>,
    pub attempted_adapters: Vec<String>,
    pub errors: Vec<FetchError>,
}

impl<T> SourceResult<T> {
    pub fn empty(dataset: Dataset) -> Self {
        Self {
            dataset,
            records: Vec::new(),
            successful_adapter: None,
            attempted_adapters: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.records.is_empty()
    }
}

fn text_or_na(value: Option<&str>) -> String {
    value
        .map(clean_text)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn clean_opt(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|v| !v.is_empty())
}

fn stat_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

fn fill_text(dst: &mut String, src: &str) {
    if is_generic_affiliation(dst) && !is_generic_affiliation(src) {
        *dst = src.to_string();
    }
}

fn fill_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if dst.is_none() && src.is_some() {
        *dst = src.clone();
    }
}

fn fill_num(dst: &mut f64, src: f64) {
    if *dst == 0.0 && src > 0.0 {
        *dst = src;
    }
}
