use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{SourceAdapter, SourceQuery, pick_f64, pick_string, selector, split_hometown, trim_base};
use crate::error::FetchError;
use crate::http_client::{HeaderProfile, fetch_text};
use crate::record::{Dataset, RawRecord};
use crate::stat_parse::{parse_height, parse_weight};

pub const NAME: &str = "on3_rankings";
const TIMEOUT_SECS: u64 = 20;

/// Fallback recruiting source: On3 industry rankings. The list is read from
/// the page's embedded Next.js data blob rather than the rendered markup.
#[derive(Debug, Clone)]
pub struct On3Rankings {
    base_url: String,
    default_class: u16,
}

impl On3Rankings {
    pub fn new(base_url: impl Into<String>, default_class: u16) -> Self {
        Self {
            base_url: base_url.into(),
            default_class,
        }
    }

    fn url(&self, class_year: u16) -> String {
        format!(
            "{}/db/rankings/industry-player/basketball/{class_year}/",
            trim_base(&self.base_url)
        )
    }
}

#[async_trait]
impl SourceAdapter for On3Rankings {
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
        let html = fetch_text(
            client,
            NAME,
            &self.url(class_year),
            HeaderProfile::Html,
            self.timeout(),
            None,
        )
        .await?;
        let records = parse_on3_rankings(&html, class_year)?;
        debug!(count = records.len(), class_year, "parsed on3 rankings");
        Ok(records)
    }
}

pub fn parse_on3_rankings(raw: &str, class_year: u16) -> Result<Vec<RawRecord>, FetchError> {
    let doc = Html::parse_document(raw);
    let script = selector(NAME, "script#__NEXT_DATA__")?;
    let blob = doc
        .select(&script)
        .next()
        .map(|s| s.inner_html())
        .ok_or_else(|| FetchError::terminal(NAME, "__NEXT_DATA__ script not found"))?;
    let root: Value = serde_json::from_str(blob.trim())
        .map_err(|err| FetchError::terminal(NAME, format!("invalid __NEXT_DATA__ json: {err}")))?;

    let page_props = root
        .get("props")
        .and_then(|p| p.get("pageProps"))
        .ok_or_else(|| FetchError::terminal(NAME, "pageProps missing"))?;
    let list = ["playerData", "rankings", "players"]
        .iter()
        .filter_map(|key| page_props.get(*key))
        .find_map(|block| block.get("list").or(Some(block)).and_then(|v| v.as_array()))
        .ok_or_else(|| FetchError::terminal(NAME, "ranking list missing"))?;

    Ok(list
        .iter()
        .map(|item| parse_item(item, class_year))
        .collect())
}

fn parse_item(item: &Value, class_year: u16) -> RawRecord {
    let person = item.get("person").unwrap_or(item);
    let rating = item.get("rating").unwrap_or(item);

    let height = match person.get("height") {
        Some(Value::String(s)) => parse_height(s),
        Some(Value::Number(n)) => n.as_f64().map(|h| h.round() as u32),
        _ => None,
    }
    .filter(|h| *h > 0);
    let weight = match person.get("weight") {
        Some(Value::String(s)) => parse_weight(s),
        Some(Value::Number(n)) => n.as_f64().map(|w| w.round() as u32),
        _ => None,
    }
    .filter(|w| *w > 0);
    let (home_town, home_state) = pick_string(person, &["homeTownName", "hometown"])
        .map(|h| split_hometown(&h))
        .unwrap_or((None, None));
    let committed_to = item
        .get("commitStatus")
        .and_then(|c| pick_string(c, &["committedOrganizationName", "orgName", "name"]));

    RawRecord {
        name: pick_string(person, &["fullName", "name"]),
        source_id: pick_string(person, &["key", "id"]),
        ranking: pick_string(rating, &["consensusNationalRank", "nationalRank", "rank"]),
        position: pick_string(person, &["positionAbbreviation", "position"]),
        height,
        weight,
        team: pick_string(person, &["highSchoolName", "highSchool"]),
        committed_to,
        league: Some("Recruiting".to_string()),
        league_type: Some("HS".to_string()),
        class_year: pick_string(person, &["classYear"])
            .or_else(|| Some(class_year.to_string())),
        home_town,
        home_state,
        home_country: Some("USA".to_string()),
        photo_url: pick_string(person, &["defaultAssetUrl", "imageUrl"]),
        stars: pick_f64(rating, &["consensusStars", "stars"])
            .map(|s| s.round().clamp(0.0, 5.0) as u8)
            .filter(|s| *s > 0),
        rating: pick_f64(rating, &["consensusRating", "rating"]),
        ..RawRecord::default()
    }
}
