use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};

use crate::enrich::DEFAULT_CONCURRENCY;
use crate::record::Dataset;
use crate::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
const DEFAULT_ROSTER_TEAM_ID: &str = "2";
const DEFAULT_ROSTER_SCHOOL_SLUG: &str = "auburn";
const DEFAULT_DEADLINE_SECS: u64 = 60;

pub const ESPN_API_BASE_URL: &str = "https://site.api.espn.com";
pub const ESPN_WEB_BASE_URL: &str = "https://site.web.api.espn.com";
pub const SPORTS_REF_BASE_URL: &str = "https://www.sports-reference.com";
pub const RECRUITING_247_BASE_URL: &str = "https://247sports.com";
pub const ON3_BASE_URL: &str = "https://www.on3.com";
pub const MAXPREPS_BASE_URL: &str = "https://www.maxpreps.com";

/// Merge authority per dataset. Lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetPriorities {
    pub roster: u8,
    pub recruiting: u8,
    pub hs_stats: u8,
}

impl Default for DatasetPriorities {
    fn default() -> Self {
        Self {
            roster: 1,
            recruiting: 2,
            hs_stats: 3,
        }
    }
}

impl DatasetPriorities {
    pub fn priority(&self, dataset: Dataset) -> u8 {
        match dataset {
            Dataset::Roster => self.roster,
            Dataset::Recruiting => self.recruiting,
            Dataset::HsStats => self.hs_stats,
            // Team ratings never enter the player merge.
            Dataset::TeamRating => u8::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrls {
    pub espn_api: String,
    pub espn_web: String,
    pub sports_ref: String,
    pub recruiting_247: String,
    pub on3: String,
    pub maxpreps: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            espn_api: ESPN_API_BASE_URL.to_string(),
            espn_web: ESPN_WEB_BASE_URL.to_string(),
            sports_ref: SPORTS_REF_BASE_URL.to_string(),
            recruiting_247: RECRUITING_247_BASE_URL.to_string(),
            on3: ON3_BASE_URL.to_string(),
            maxpreps: MAXPREPS_BASE_URL.to_string(),
        }
    }
}

impl SourceUrls {
    /// Every host pointed at one base, for mock servers.
    pub fn all(base: &str) -> Self {
        Self {
            espn_api: base.to_string(),
            espn_web: base.to_string(),
            sports_ref: base.to_string(),
            recruiting_247: base.to_string(),
            on3: base.to_string(),
            maxpreps: base.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub bind_addr: SocketAddr,
    pub roster_team_id: String,
    pub roster_school_slug: String,
    pub roster_season: u16,
    pub recruiting_class: u16,
    pub hs_state: Option<String>,
    pub enrich_enabled: bool,
    pub enrich_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub aggregate_deadline: Duration,
    pub priorities: DatasetPriorities,
    pub urls: SourceUrls,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let season = current_year();
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            roster_team_id: DEFAULT_ROSTER_TEAM_ID.to_string(),
            roster_school_slug: DEFAULT_ROSTER_SCHOOL_SLUG.to_string(),
            roster_season: season,
            recruiting_class: season.saturating_add(1).clamp(2000, 2100),
            hs_state: None,
            enrich_enabled: true,
            enrich_concurrency: DEFAULT_CONCURRENCY,
            retry_max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_BASE_DELAY_MS,
            aggregate_deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            priorities: DatasetPriorities::default(),
            urls: SourceUrls::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_addr = env_string("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be host:port")?;
        let roster_season = env_parse::<u16>("ROSTER_SEASON").unwrap_or(defaults.roster_season);
        let recruiting_class = env_parse::<u16>("RECRUITING_CLASS")
            .unwrap_or(defaults.recruiting_class)
            .clamp(2000, 2100);
        let enrich_concurrency = env_parse::<usize>("ENRICH_CONCURRENCY")
            .unwrap_or(DEFAULT_CONCURRENCY)
            .clamp(1, 32);
        let retry_max_attempts = env_parse::<u32>("RETRY_MAX_ATTEMPTS")
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .clamp(1, 6);
        let retry_base_delay_ms = env_parse::<u64>("RETRY_BASE_DELAY_MS")
            .unwrap_or(DEFAULT_BASE_DELAY_MS)
            .clamp(0, 10_000);
        let deadline_secs = env_parse::<u64>("AGGREGATE_DEADLINE_SECS")
            .unwrap_or(DEFAULT_DEADLINE_SECS)
            .clamp(5, 300);

        let urls = SourceUrls {
            espn_api: env_string("ESPN_API_BASE_URL").unwrap_or(defaults.urls.espn_api),
            espn_web: env_string("ESPN_WEB_BASE_URL").unwrap_or(defaults.urls.espn_web),
            sports_ref: env_string("SPORTS_REF_BASE_URL").unwrap_or(defaults.urls.sports_ref),
            recruiting_247: env_string("RECRUITING_247_BASE_URL")
                .unwrap_or(defaults.urls.recruiting_247),
            on3: env_string("ON3_BASE_URL").unwrap_or(defaults.urls.on3),
            maxpreps: env_string("MAXPREPS_BASE_URL").unwrap_or(defaults.urls.maxpreps),
        };

        Ok(Self {
            bind_addr,
            roster_team_id: env_string("ROSTER_TEAM_ID").unwrap_or(defaults.roster_team_id),
            roster_school_slug: env_string("ROSTER_SCHOOL_SLUG")
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or(defaults.roster_school_slug),
            roster_season,
            recruiting_class,
            hs_state: env_string("HS_STATE").map(|s| s.to_ascii_lowercase()),
            enrich_enabled: env_bool("ENRICH_ENABLED", true),
            enrich_concurrency,
            retry_max_attempts,
            retry_base_delay_ms,
            aggregate_deadline: Duration::from_secs(deadline_secs),
            priorities: DatasetPriorities::default(),
            urls,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

pub fn current_year() -> u16 {
    u16::try_from(Utc::now().year()).unwrap_or(2025)
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse::<T>().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{AggregatorConfig, DatasetPriorities};
    use crate::record::Dataset;

    #[test]
    fn priorities_follow_table() {
        let p = DatasetPriorities::default();
        assert!(p.priority(Dataset::Roster) < p.priority(Dataset::Recruiting));
        assert!(p.priority(Dataset::Recruiting) < p.priority(Dataset::HsStats));
    }

    #[test]
    fn default_retry_policy() {
        let policy = AggregatorConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay.as_millis(), 1000);
    }
}
