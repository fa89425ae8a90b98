use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::espn_athlete_stats::EspnAthleteStats;
use crate::adapters::espn_roster::EspnRoster;
use crate::adapters::maxpreps_leaders::MaxPrepsLeaders;
use crate::adapters::maxpreps_text::MaxPrepsText;
use crate::adapters::on3_rankings::On3Rankings;
use crate::adapters::recruiting_247::Recruiting247;
use crate::adapters::sports_ref_ratings::SportsRefRatings;
use crate::adapters::sports_ref_roster::SportsRefRoster;
use crate::adapters::{RecordEnricher, SourceAdapter, SourceQuery};
use crate::config::{AggregatorConfig, DatasetPriorities};
use crate::enrich::Enricher;
use crate::error::{AggregateError, FetchError};
use crate::merge::{DatasetBatch, merge};
use crate::record::{
    Dataset, PlayerRecord, RawRecord, RecruitRecord, SourceResult, Structured, TeamRating,
};
use crate::retry::{RetryGuard, RetryPolicy, with_retry};
use crate::sequencer::{AdapterList, FetchContext, resolve_dataset};

/// Time kept back from the request deadline when enriching, so a slow
/// enrichment pass still leaves the roster itself inside the budget.
const ENRICH_DEADLINE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetState {
    Ok,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatus {
    pub dataset: Dataset,
    pub status: DatasetState,
    pub successful_adapter: Option<String>,
    pub count: usize,
    pub errors: Vec<FetchError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub datasets_attempted: usize,
    pub datasets_succeeded: usize,
    pub total_players: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub players: Vec<PlayerRecord>,
    pub summary: AggregateSummary,
    pub datasets: Vec<DatasetStatus>,
    pub errors: Vec<FetchError>,
    pub timestamp: String,
}

/// Owns the adapter chains for every dataset and runs them per request.
pub struct Aggregator {
    client: Client,
    roster: AdapterList<RawRecord>,
    recruiting: AdapterList<RawRecord>,
    hs_stats: AdapterList<RawRecord>,
    ratings: AdapterList<TeamRating>,
    enricher: Option<Arc<dyn RecordEnricher>>,
    pool: Enricher,
    priorities: DatasetPriorities,
    retry: RetryPolicy,
    deadline: Duration,
    default_class: u16,
    default_state: Option<String>,
    shutdown: CancellationToken,
}

impl Aggregator {
    /// An aggregator with no adapters. Chains are attached with the `with_*`
    /// builders.
    pub fn new(client: Client, retry: RetryPolicy, deadline: Duration) -> Self {
        Self {
            client,
            roster: Vec::new(),
            recruiting: Vec::new(),
            hs_stats: Vec::new(),
            ratings: Vec::new(),
            enricher: None,
            pool: Enricher::default(),
            priorities: DatasetPriorities::default(),
            retry,
            deadline,
            default_class: crate::config::current_year().saturating_add(1),
            default_state: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(cfg: &AggregatorConfig, client: Client) -> Self {
        let urls = &cfg.urls;
        let roster: AdapterList<RawRecord> = vec![
            Arc::new(EspnRoster::new(&urls.espn_api, &cfg.roster_team_id)),
            Arc::new(SportsRefRoster::new(
                &urls.sports_ref,
                &cfg.roster_school_slug,
                cfg.roster_season,
            )),
        ];
        let recruiting: AdapterList<RawRecord> = vec![
            Arc::new(Recruiting247::new(&urls.recruiting_247, cfg.recruiting_class)),
            Arc::new(On3Rankings::new(&urls.on3, cfg.recruiting_class)),
        ];
        let hs_stats: AdapterList<RawRecord> = vec![
            Arc::new(MaxPrepsLeaders::new(&urls.maxpreps, cfg.hs_state.clone())),
            Arc::new(MaxPrepsText::new(&urls.maxpreps)),
        ];
        let ratings: AdapterList<TeamRating> = vec![Arc::new(SportsRefRatings::new(
            &urls.sports_ref,
            cfg.roster_season,
        ))];

        let mut aggregator = Self::new(client, cfg.retry_policy(), cfg.aggregate_deadline)
            .with_roster(roster)
            .with_recruiting(recruiting)
            .with_hs_stats(hs_stats)
            .with_ratings(ratings)
            .with_priorities(cfg.priorities)
            .with_defaults(cfg.recruiting_class, cfg.hs_state.clone());
        if cfg.enrich_enabled {
            aggregator = aggregator.with_enricher(
                Arc::new(EspnAthleteStats::new(&urls.espn_web)),
                Enricher::new(cfg.enrich_concurrency),
            );
        }
        aggregator
    }

    pub fn with_roster(mut self, adapters: AdapterList<RawRecord>) -> Self {
        self.roster = adapters;
        self
    }

    pub fn with_recruiting(mut self, adapters: AdapterList<RawRecord>) -> Self {
        self.recruiting = adapters;
        self
    }

    pub fn with_hs_stats(mut self, adapters: AdapterList<RawRecord>) -> Self {
        self.hs_stats = adapters;
        self
    }

    pub fn with_ratings(mut self, adapters: AdapterList<TeamRating>) -> Self {
        self.ratings = adapters;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn RecordEnricher>, pool: Enricher) -> Self {
        self.enricher = Some(enricher);
        self.pool = pool;
        self
    }

    pub fn with_priorities(mut self, priorities: DatasetPriorities) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn with_defaults(mut self, class_year: u16, state: Option<String>) -> Self {
        self.default_class = class_year;
        self.default_state = state;
        self
    }

    /// Cancelling this stops every in-flight retry loop from scheduling
    /// another attempt.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn context(&self, deadline: Instant) -> FetchContext {
        FetchContext::new(
            self.client.clone(),
            self.retry,
            RetryGuard::new(self.shutdown.child_token(), Some(deadline)),
        )
    }

    pub async fn roster(&self) -> SourceResult<PlayerRecord> {
        let deadline = Instant::now() + self.deadline;
        let ctx = self.context(deadline);
        let raw = self
            .bounded_roster(&SourceQuery::default(), &ctx, deadline)
            .await
            .result;
        self.player_result(raw)
    }

    pub async fn recruiting(&self, class_year: u16) -> SourceResult<RecruitRecord> {
        let deadline = Instant::now() + self.deadline;
        let ctx = self.context(deadline);
        let query = SourceQuery::for_class(class_year);
        let raw = bounded(Dataset::Recruiting, &self.recruiting, &query, &ctx, deadline)
            .await
            .result;
        convert(raw, |record, adapter| RecruitRecord::from_raw(record, adapter))
    }

    pub async fn hs_stats(&self, state: Option<String>) -> SourceResult<PlayerRecord> {
        let deadline = Instant::now() + self.deadline;
        let ctx = self.context(deadline);
        let query = SourceQuery {
            state: state.or_else(|| self.default_state.clone()),
            ..SourceQuery::default()
        };
        let raw = bounded(Dataset::HsStats, &self.hs_stats, &query, &ctx, deadline)
            .await
            .result;
        self.player_result(raw)
    }

    pub async fn team_rating(&self, team: &str) -> SourceResult<TeamRating> {
        let deadline = Instant::now() + self.deadline;
        let ctx = self.context(deadline);
        let query = SourceQuery::for_team(team);
        bounded(Dataset::TeamRating, &self.ratings, &query, &ctx, deadline)
            .await
            .result
    }

    /// Fans out to every player dataset at once, merges whatever finished
    /// before the deadline and reports the rest as failed or timed out.
    /// Fails only when no dataset produced a record.
    #[instrument(skip_all)]
    pub async fn aggregate(&self, query: &SourceQuery) -> Result<AggregateReport, AggregateError> {
        let deadline = Instant::now() + self.deadline;
        let ctx = self.context(deadline);
        let query = SourceQuery {
            class_year: query.class_year.or(Some(self.default_class)),
            state: query.state.clone().or_else(|| self.default_state.clone()),
            team: query.team.clone(),
        };

        let (roster, recruiting, hs_stats) = tokio::join!(
            self.bounded_roster(&query, &ctx, deadline),
            bounded(Dataset::Recruiting, &self.recruiting, &query, &ctx, deadline),
            bounded(Dataset::HsStats, &self.hs_stats, &query, &ctx, deadline),
        );
        let outcomes = [roster, recruiting, hs_stats];

        let mut batches = Vec::new();
        let mut datasets = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            let Bounded { result, timed_out } = outcome;
            let dataset = result.dataset;
            let priority = self.priorities.priority(dataset);
            let players = convert(result, |record, adapter| {
                PlayerRecord::from_raw(record, dataset, adapter, priority)
            });
            let status = if players.succeeded() {
                DatasetState::Ok
            } else if timed_out {
                DatasetState::TimedOut
            } else {
                DatasetState::Failed
            };
            datasets.push(DatasetStatus {
                dataset,
                status,
                successful_adapter: players.successful_adapter.clone(),
                count: players.records.len(),
                errors: players.errors.clone(),
            });
            errors.extend(players.errors);
            if !players.records.is_empty() {
                batches.push(DatasetBatch {
                    dataset,
                    priority,
                    records: players.records,
                });
            }
        }

        let attempted = datasets.len();
        let succeeded = datasets.iter().filter(|d| d.status == DatasetState::Ok).count();
        if succeeded == 0 {
            warn!(attempted, errors = errors.len(), "aggregate failed: no dataset produced records");
            return Err(AggregateError {
                attempted,
                failed: datasets.iter().map(|d| d.dataset).collect(),
                errors,
            });
        }

        let players = merge(&batches);
        info!(
            attempted,
            succeeded,
            players = players.len(),
            errors = errors.len(),
            "aggregate complete"
        );
        Ok(AggregateReport {
            summary: AggregateSummary {
                datasets_attempted: attempted,
                datasets_succeeded: succeeded,
                total_players: players.len(),
            },
            players,
            datasets,
            errors,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    async fn bounded_roster(
        &self,
        query: &SourceQuery,
        ctx: &FetchContext,
        deadline: Instant,
    ) -> Bounded<RawRecord> {
        let mut result = SourceResult::empty(Dataset::Roster);
        let roster = self.resolve_roster(&mut result, query, ctx, deadline);
        let finished = timeout_at(deadline, roster).await.is_ok();
        Bounded::settle(result, finished)
    }

    /// Roster chain followed by per-athlete enrichment. Each enrichment call
    /// is retried and cut off at the deadline minus a margin; an athlete it
    /// did not reach stays as fetched while the rest keep their stats.
    #[instrument(skip_all)]
    async fn resolve_roster(
        &self,
        result: &mut SourceResult<RawRecord>,
        query: &SourceQuery,
        ctx: &FetchContext,
        deadline: Instant,
    ) {
        resolve_dataset(result, &self.roster, query, ctx).await;
        let Some(enricher) = self.enricher.as_ref() else {
            return;
        };
        if result.records.is_empty() {
            return;
        }

        let enrich_deadline = deadline
            .checked_sub(ENRICH_DEADLINE_MARGIN)
            .unwrap_or(deadline);
        let guard = RetryGuard::new(ctx.guard.cancel.clone(), Some(enrich_deadline));
        let (guard, retry, client) = (&guard, &ctx.retry, &ctx.client);
        let count = result.records.len();
        let originals = result.records.clone();
        result.records = self
            .pool
            .run(originals, |record| async move {
                let attempts =
                    with_retry(retry, guard, move |_| enricher.enrich(record.clone(), client));
                match timeout_at(enrich_deadline, attempts).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchError::timed_out(
                        enricher.name(),
                        "enrichment deadline elapsed",
                    )),
                }
            })
            .await;
        debug!(enricher = enricher.name(), count, "roster enrichment finished");
    }

    fn player_result(&self, raw: SourceResult<RawRecord>) -> SourceResult<PlayerRecord> {
        let dataset = raw.dataset;
        let priority = self.priorities.priority(dataset);
        convert(raw, |record, adapter| {
            PlayerRecord::from_raw(record, dataset, adapter, priority)
        })
    }
}

struct Bounded<T> {
    result: SourceResult<T>,
    timed_out: bool,
}

impl<T> Bounded<T> {
    /// A resolution cut off by the deadline keeps everything it recorded and
    /// gains a timed-out error for the adapter still in flight.
    fn settle(mut result: SourceResult<T>, finished: bool) -> Self {
        let timed_out = !finished && result.records.is_empty();
        if timed_out {
            let dataset = result.dataset;
            warn!(%dataset, errors = result.errors.len(), "dataset did not finish before the deadline");
            let in_flight = if result.attempted_adapters.len() > result.errors.len() {
                result.attempted_adapters.last().cloned()
            } else {
                None
            };
            let source = in_flight.unwrap_or_else(|| dataset.as_str().to_string());
            result
                .errors
                .push(FetchError::timed_out(&source, "aggregate deadline elapsed"));
        }
        Self { result, timed_out }
    }
}

/// Runs one dataset's adapter chain against the shared deadline.
async fn bounded<T>(
    dataset: Dataset,
    adapters: &[Arc<dyn SourceAdapter<Output = T>>],
    query: &SourceQuery,
    ctx: &FetchContext,
    deadline: Instant,
) -> Bounded<T>
where
    T: Structured + Send + 'static,
{
    let mut result = SourceResult::empty(dataset);
    let finished = timeout_at(deadline, resolve_dataset(&mut result, adapters, query, ctx))
        .await
        .is_ok();
    Bounded::settle(result, finished)
}

fn convert<T, U>(
    result: SourceResult<T>,
    mut f: impl FnMut(&T, &str) -> Option<U>,
) -> SourceResult<U> {
    let adapter = result.successful_adapter.clone().unwrap_or_default();
    SourceResult {
        dataset: result.dataset,
        records: result.records.iter().filter_map(|r| f(r, &adapter)).collect(),
        successful_adapter: result.successful_adapter,
        attempted_adapters: result.attempted_adapters,
        errors: result.errors,
    }
}
