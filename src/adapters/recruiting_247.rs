use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument};

use super::{
    SourceAdapter, SourceQuery, element_text, select_text, selector, split_hometown, trim_base,
};
use crate::error::FetchError;
use crate::http_client::{HeaderProfile, fetch_text};
use crate::record::{Dataset, RawRecord};
use crate::stat_parse::{parse_height, parse_number, parse_weight};

pub const NAME: &str = "recruiting_247";
const TIMEOUT_SECS: u64 = 20;

static SCHOOL_META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<school>[^(]+?)\s*\((?P<home>[^)]*)\)").expect("static regex"));

/// Composite recruiting rankings list from 247Sports.
#[derive(Debug, Clone)]
pub struct Recruiting247 {
    base_url: String,
    default_class: u16,
}

impl Recruiting247 {
    pub fn new(base_url: impl Into<String>, default_class: u16) -> Self {
        Self {
            base_url: base_url.into(),
            default_class,
        }
    }

    fn url(&self, class_year: u16) -> String {
        format!(
            "{}/season/{class_year}-basketball/compositerecruitrankings/",
            trim_base(&self.base_url)
        )
    }
}

#[async_trait]
impl SourceAdapter for Recruiting247 {
    type Output = RawRecord;

    fn name(&self) -> &'static str {
        NAME
    }

    fn dataset(&self) -> Dataset {
        Dataset::Recruiting
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    #[instrument(skip_all, fields(adapter = NAME))]
    async fn fetch(&self, query: &SourceQuery, client: &Client) -> Result<Vec<RawRecord>, FetchError> {
        let class_year = query.class_year.unwrap_or(self.default_class);
        let url = self.url(class_year);
        let html = fetch_text(
            client,
            NAME,
            &url,
            HeaderProfile::Html,
            self.timeout(),
            Some(trim_base(&self.base_url)),
        )
        .await?;
        let records = parse_247_rankings(&html, class_year)?;
        debug!(count = records.len(), class_year, "parsed 247 rankings");
        Ok(records)
    }
}

pub fn parse_247_rankings(raw: &str, class_year: u16) -> Result<Vec<RawRecord>, FetchError> {
    let doc = Html::parse_document(raw);
    let list = selector(NAME, "ul.rankings-page__list")?;
    let item = selector(NAME, "li.rankings-page__list-item")?;
    let rank = selector(NAME, ".rank-column .primary")?;
    let name = selector(NAME, "a.rankings-page__name-link")?;
    let meta = selector(NAME, ".recruit .meta")?;
    let position = selector(NAME, ".position")?;
    let metrics = selector(NAME, ".metrics")?;
    let score = selector(NAME, ".rankings-page__star-and-score .score")?;
    let star = selector(NAME, ".rankings-page__star-and-score .icon-starsolid.yellow")?;
    let commit = selector(NAME, ".status img")?;
    let photo = selector(NAME, "img.circle-image-block, .circle-image-block img")?;

    if doc.select(&list).next().is_none() && doc.select(&item).next().is_none() {
        return Err(FetchError::terminal(NAME, "rankings list not found"));
    }

    let mut records = Vec::new();
    for row in doc.select(&item) {
        // Ad slots reuse the list item class but carry no name link.
        let Some(player_name) = select_text(&row, &name) else {
            continue;
        };
        let (school, home_town, home_state) = match select_text(&row, &meta) {
            Some(meta_text) => split_school_meta(&meta_text),
            None => (None, None, None),
        };
        let (height, weight) = select_text(&row, &metrics)
            .map(|m| split_metrics(&m))
            .unwrap_or((None, None));
        let stars = row.select(&star).count();
        let committed_to = row
            .select(&commit)
            .next()
            .and_then(|img| img.value().attr("title").or_else(|| img.value().attr("alt")))
            .map(str::to_string);
        let photo_url = row
            .select(&photo)
            .next()
            .and_then(|img| img.value().attr("data-src").or_else(|| img.value().attr("src")))
            .map(str::to_string);

        records.push(RawRecord {
            name: Some(player_name),
            ranking: row.select(&rank).next().map(|r| element_text(&r)),
            position: select_text(&row, &position),
            height,
            weight,
            team: school,
            committed_to,
            league: Some("Recruiting".to_string()),
            league_type: Some("HS".to_string()),
            class_year: Some(class_year.to_string()),
            home_town,
            home_state,
            home_country: Some("USA".to_string()),
            photo_url,
            stars: u8::try_from(stars).ok().filter(|s| *s > 0),
            rating: select_text(&row, &score).map(|s| parse_number(&s)).filter(|r| *r > 0.0),
            ..RawRecord::default()
        });
    }
    Ok(records)
}

/// `"Montverde Academy (Montverde, FL)"` -> school, town, state.
pub fn split_school_meta(meta: &str) -> (Option<String>, Option<String>, Option<String>) {
    match SCHOOL_META_RE.captures(meta) {
        Some(caps) => {
            let school = caps.name("school").map(|m| m.as_str().trim().to_string());
            let (town, state) = caps
                .name("home")
                .map(|m| split_hometown(m.as_str()))
                .unwrap_or((None, None));
            (school, town, state)
        }
        None => (Some(meta.trim().to_string()).filter(|s| !s.is_empty()), None, None),
    }
}

/// `"6-9 / 205"` -> height, weight.
fn split_metrics(metrics: &str) -> (Option<u32>, Option<u32>) {
    match metrics.split_once('/') {
        Some((height, weight)) => (parse_height(height), parse_weight(weight)),
        None => (parse_height(metrics), None),
    }
}
