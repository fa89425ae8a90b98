use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use hoops_aggregator::adapters::{RecordEnricher, SourceAdapter, SourceQuery};
use hoops_aggregator::enrich::Enricher;
use hoops_aggregator::error::{FetchError, FetchErrorKind};
use hoops_aggregator::orchestrator::{Aggregator, DatasetState};
use hoops_aggregator::record::{Dataset, RawRecord, TeamRating};
use hoops_aggregator::retry::RetryPolicy;

#[derive(Clone)]
enum Behavior {
    Records(Vec<RawRecord>),
    Fail(FetchErrorKind),
    Hang,
}

struct FakeAdapter {
    name: &'static str,
    dataset: Dataset,
    behavior: Behavior,
    calls: Arc<AtomicU32>,
}

impl FakeAdapter {
    fn new(name: &'static str, dataset: Dataset, behavior: Behavior) -> Self {
        Self {
            name,
            dataset,
            behavior,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    type Output = RawRecord;

    fn name(&self) -> &'static str {
        self.name
    }

    fn dataset(&self) -> Dataset {
        self.dataset
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self, _query: &SourceQuery, _client: &Client) -> Result<Vec<RawRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Records(records) => Ok(records.clone()),
            Behavior::Fail(kind) => Err(FetchError::new(self.name, *kind, "scripted failure")),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

struct FakeRatings(Vec<TeamRating>);

#[async_trait]
impl SourceAdapter for FakeRatings {
    type Output = TeamRating;

    fn name(&self) -> &'static str {
        "fake_ratings"
    }

    fn dataset(&self) -> Dataset {
        Dataset::TeamRating
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self, query: &SourceQuery, _client: &Client) -> Result<Vec<TeamRating>, FetchError> {
        let team = query.team.clone().unwrap_or_default().to_lowercase();
        Ok(self.0.iter().filter(|r| r.team.to_lowercase() == team).cloned().collect())
    }
}

/// Adds ten points to everyone except players named "Fail Me".
struct PointsEnricher;

#[async_trait]
impl RecordEnricher for PointsEnricher {
    fn name(&self) -> &'static str {
        "points_enricher"
    }

    async fn enrich(&self, mut record: RawRecord, _client: &Client) -> Result<RawRecord, FetchError> {
        if record.name.as_deref() == Some("Fail Me") {
            return Err(FetchError::retryable(self.name(), "http 500"));
        }
        record.stats.points = Some(record.stats.points.unwrap_or(0.0) + 10.0);
        Ok(record)
    }
}

fn named(name: &str, team: &str) -> RawRecord {
    RawRecord {
        name: Some(name.to_string()),
        team: Some(team.to_string()),
        ..RawRecord::default()
    }
}

fn aggregator() -> Aggregator {
    Aggregator::new(
        Client::new(),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        },
        Duration::from_secs(20),
    )
}

type Adapter = Arc<dyn SourceAdapter<Output = RawRecord>>;

fn ok(name: &'static str, dataset: Dataset, records: Vec<RawRecord>) -> Adapter {
    Arc::new(FakeAdapter::new(name, dataset, Behavior::Records(records)))
}

fn failing(name: &'static str, dataset: Dataset, kind: FetchErrorKind) -> Adapter {
    Arc::new(FakeAdapter::new(name, dataset, Behavior::Fail(kind)))
}

#[tokio::test(start_paused = true)]
async fn partial_failure_still_returns_players() {
    let agg = aggregator()
        .with_roster(vec![ok(
            "roster_a",
            Dataset::Roster,
            vec![named("Johni Broome", "Auburn"), named("Denver Jones", "Auburn")],
        )])
        .with_recruiting(vec![ok(
            "recruit_a",
            Dataset::Recruiting,
            vec![named("Cooper Flagg", "Montverde Academy")],
        )])
        .with_hs_stats(vec![failing("hs_a", Dataset::HsStats, FetchErrorKind::Retryable)]);

    let report = agg.aggregate(&SourceQuery::default()).await.expect("partial data");
    assert_eq!(report.summary.datasets_attempted, 3);
    assert_eq!(report.summary.datasets_succeeded, 2);
    assert_eq!(report.summary.total_players, 3);
    assert_eq!(report.players.len(), 3);

    let hs = report.datasets.iter().find(|d| d.dataset == Dataset::HsStats).unwrap();
    assert_eq!(hs.status, DatasetState::Failed);
    assert_eq!(hs.errors.len(), 1);
    assert_eq!(hs.errors[0].kind, FetchErrorKind::Exhausted);
    assert_eq!(hs.errors[0].attempts, 2);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn total_failure_is_an_error_without_players() {
    let agg = aggregator()
        .with_roster(vec![
            failing("roster_a", Dataset::Roster, FetchErrorKind::Terminal),
            ok("roster_b", Dataset::Roster, Vec::new()),
        ])
        .with_recruiting(vec![failing("recruit_a", Dataset::Recruiting, FetchErrorKind::Retryable)])
        .with_hs_stats(vec![failing("hs_a", Dataset::HsStats, FetchErrorKind::Terminal)]);

    let err = agg.aggregate(&SourceQuery::default()).await.unwrap_err();
    assert_eq!(err.attempted, 3);
    assert_eq!(err.failed, vec![Dataset::Roster, Dataset::Recruiting, Dataset::HsStats]);
    assert_eq!(err.errors.len(), 4);
    assert!(err.errors.iter().any(|e| e.kind == FetchErrorKind::Empty));
}

#[tokio::test(start_paused = true)]
async fn fallback_stops_at_first_success_and_keeps_errors() {
    let primary = FakeAdapter::new(
        "roster_a",
        Dataset::Roster,
        Behavior::Fail(FetchErrorKind::Terminal),
    );
    let never = FakeAdapter::new(
        "roster_c",
        Dataset::Roster,
        Behavior::Records(vec![named("Someone Else", "Auburn")]),
    );
    let (primary_calls, never_calls) = (primary.calls.clone(), never.calls.clone());

    let agg = aggregator().with_roster(vec![
        Arc::new(primary) as Adapter,
        ok("roster_b", Dataset::Roster, vec![named("Johni Broome", "Auburn")]),
        Arc::new(never) as Adapter,
    ]);
    let result = agg.roster().await;

    assert!(result.succeeded());
    assert_eq!(result.successful_adapter.as_deref(), Some("roster_b"));
    assert_eq!(result.attempted_adapters, vec!["roster_a", "roster_b"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].source_name, "roster_a");
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(never_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.records[0].source_adapter, "roster_b");
    assert_eq!(result.records[0].priority, 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_records_do_not_count_as_success() {
    let nameless = ok("roster_a", Dataset::Roster, vec![RawRecord::default(), named("  ", "Auburn")]);
    let good = ok("roster_b", Dataset::Roster, vec![named("Johni Broome", "Auburn")]);
    let agg = aggregator().with_roster(vec![nameless, good]);

    let result = agg.roster().await;
    assert_eq!(result.successful_adapter.as_deref(), Some("roster_b"));
    assert_eq!(result.errors[0].kind, FetchErrorKind::Empty);
    assert_eq!(result.records.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_dataset_is_reported_as_timed_out() {
    let agg = Aggregator::new(
        Client::new(),
        RetryPolicy::default(),
        Duration::from_secs(5),
    )
    .with_roster(vec![ok("roster_a", Dataset::Roster, vec![named("Johni Broome", "Auburn")])])
    .with_recruiting(vec![ok(
        "recruit_a",
        Dataset::Recruiting,
        vec![named("Cooper Flagg", "Montverde Academy")],
    )])
    .with_hs_stats(vec![Arc::new(FakeAdapter::new("hs_slow", Dataset::HsStats, Behavior::Hang))]);

    let started = tokio::time::Instant::now();
    let report = agg.aggregate(&SourceQuery::default()).await.expect("partial data");
    assert!(started.elapsed() <= Duration::from_secs(5));

    let hs = report.datasets.iter().find(|d| d.dataset == Dataset::HsStats).unwrap();
    assert_eq!(hs.status, DatasetState::TimedOut);
    assert_eq!(hs.errors[0].kind, FetchErrorKind::TimedOut);
    assert_eq!(report.summary.datasets_succeeded, 2);
    assert_eq!(report.players.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn roster_outranks_lower_priority_duplicates() {
    let mut hs_row = named("Johni Broome", "Auburn");
    hs_row.position = Some("C".to_string());
    hs_row.stats.points = Some(30.0);
    let mut roster_row = named("Johni Broome", "Auburn");
    roster_row.position = Some("F".to_string());

    let agg = aggregator()
        .with_roster(vec![ok("roster_a", Dataset::Roster, vec![roster_row])])
        .with_hs_stats(vec![ok("hs_a", Dataset::HsStats, vec![hs_row])]);

    let report = agg.aggregate(&SourceQuery::default()).await.unwrap();
    assert_eq!(report.players.len(), 1);
    let broome = &report.players[0];
    assert_eq!(broome.position, "F");
    assert_eq!(broome.points, 0.0);
    assert_eq!(broome.data_source, "roster");
    // No recruiting adapters registered: attempted but failed.
    assert_eq!(report.summary.datasets_attempted, 3);
    assert_eq!(report.summary.datasets_succeeded, 2);
}

#[tokio::test(start_paused = true)]
async fn enrichment_failure_degrades_one_record() {
    let agg = aggregator()
        .with_roster(vec![ok(
            "roster_a",
            Dataset::Roster,
            vec![named("Johni Broome", "Auburn"), named("Fail Me", "Auburn")],
        )])
        .with_enricher(Arc::new(PointsEnricher), Enricher::new(2));

    let result = agg.roster().await;
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].points, 10.0);
    assert_eq!(result.records[1].name, "Fail Me");
    assert_eq!(result.records[1].points, 0.0);
}

#[tokio::test(start_paused = true)]
async fn team_rating_lookup() {
    let rating = TeamRating {
        team: "Auburn".to_string(),
        ranking: Some(2),
        rating: 27.16,
        offense: 126.0,
        defense: 95.1,
        conference: Some("SEC".to_string()),
    };
    let agg = aggregator().with_ratings(vec![Arc::new(FakeRatings(vec![rating]))]);

    let found = agg.team_rating("auburn").await;
    assert_eq!(found.records.len(), 1);
    assert_eq!(found.records[0].rating, 27.16);

    let missing = agg.team_rating("gonzaga").await;
    assert!(missing.records.is_empty());
    assert_eq!(missing.errors.len(), 1);
    assert_eq!(missing.errors[0].kind, FetchErrorKind::Empty);
}

/// Fails each athlete's first call with a retryable error, then adds points.
struct FlakyEnricher {
    calls: AtomicU32,
}

#[async_trait]
impl RecordEnricher for FlakyEnricher {
    fn name(&self) -> &'static str {
        "flaky_enricher"
    }

    async fn enrich(&self, mut record: RawRecord, _client: &Client) -> Result<RawRecord, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(FetchError::retryable(self.name(), "http 503"));
        }
        record.stats.points = Some(20.0);
        Ok(record)
    }
}

/// Takes a second per athlete, except "Slow One" who never answers.
struct SleepyEnricher;

#[async_trait]
impl RecordEnricher for SleepyEnricher {
    fn name(&self) -> &'static str {
        "sleepy_enricher"
    }

    async fn enrich(&self, mut record: RawRecord, _client: &Client) -> Result<RawRecord, FetchError> {
        let wait = if record.name.as_deref() == Some("Slow One") { 3600 } else { 1 };
        tokio::time::sleep(Duration::from_secs(wait)).await;
        record.stats.points = Some(20.0);
        Ok(record)
    }
}

#[tokio::test(start_paused = true)]
async fn enrichment_retries_transient_failures() {
    let enricher = Arc::new(FlakyEnricher {
        calls: AtomicU32::new(0),
    });
    let agg = aggregator()
        .with_roster(vec![ok(
            "roster_a",
            Dataset::Roster,
            vec![named("Johni Broome", "Auburn")],
        )])
        .with_enricher(enricher.clone(), Enricher::new(1));

    let result = agg.roster().await;
    assert_eq!(result.records[0].points, 20.0);
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_enrichment_keeps_finished_athletes() {
    let agg = Aggregator::new(
        Client::new(),
        RetryPolicy::default(),
        Duration::from_secs(20),
    )
    .with_roster(vec![ok(
        "roster_a",
        Dataset::Roster,
        vec![
            named("Fast One", "Auburn"),
            named("Fast Two", "Auburn"),
            named("Slow One", "Auburn"),
        ],
    )])
    .with_enricher(Arc::new(SleepyEnricher), Enricher::new(3));

    let started = tokio::time::Instant::now();
    let result = agg.roster().await;
    // Enrichment stops five seconds ahead of the 20s deadline.
    assert_eq!(started.elapsed(), Duration::from_secs(15));

    let points: Vec<(&str, f64)> = result
        .records
        .iter()
        .map(|p| (p.name.as_str(), p.points))
        .collect();
    assert_eq!(
        points,
        vec![("Fast One", 20.0), ("Fast Two", 20.0), ("Slow One", 0.0)]
    );
    assert!(result.succeeded());
}

#[tokio::test(start_paused = true)]
async fn timed_out_dataset_keeps_earlier_adapter_errors() {
    let agg = Aggregator::new(
        Client::new(),
        RetryPolicy::default(),
        Duration::from_secs(10),
    )
    .with_roster(vec![ok("roster_a", Dataset::Roster, vec![named("Johni Broome", "Auburn")])])
    .with_hs_stats(vec![
        failing("hs_first", Dataset::HsStats, FetchErrorKind::Terminal),
        Arc::new(FakeAdapter::new("hs_slow", Dataset::HsStats, Behavior::Hang)),
    ]);

    let report = agg.aggregate(&SourceQuery::default()).await.expect("roster data");
    let hs = report.datasets.iter().find(|d| d.dataset == Dataset::HsStats).unwrap();
    assert_eq!(hs.status, DatasetState::TimedOut);
    let trail: Vec<(&str, FetchErrorKind)> = hs
        .errors
        .iter()
        .map(|e| (e.source_name.as_str(), e.kind))
        .collect();
    assert_eq!(
        trail,
        vec![
            ("hs_first", FetchErrorKind::Terminal),
            ("hs_slow", FetchErrorKind::TimedOut),
        ]
    );

    let direct = agg.hs_stats(None).await;
    assert_eq!(direct.attempted_adapters, vec!["hs_first", "hs_slow"]);
    assert_eq!(direct.errors.len(), 2);
    assert_eq!(direct.errors[1].kind, FetchErrorKind::TimedOut);
}
