use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::adapters::SourceQuery;
use crate::error::{AggregateError, FetchErrorKind};
use crate::orchestrator::Aggregator;
use crate::record::SourceResult;

pub struct AppState {
    pub aggregator: Aggregator,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/roster", get(roster))
        .route("/api/recruiting/:class_year", get(recruiting))
        .route("/api/hs-stats", get(hs_stats))
        .route("/api/team-rating/:team_name", get(team_rating))
        .route("/api/aggregate", get(aggregate))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Uniform error body: `{ error, message, timestamp, details? }` plus any
/// endpoint-specific extras.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    extra: Option<(&'static str, Value)>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            extra: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn with_extra(mut self, key: &'static str, value: Value) -> Self {
        self.extra = Some((key, value));
        self
    }

    fn from_dataset<T>(code: &'static str, result: &SourceResult<T>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            format!("every {} source failed", result.dataset),
        )
        .with_details(json!(result.errors))
        .with_extra("attemptedSources", json!(result.attempted_adapters))
    }
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        let failed: Vec<&str> = err.failed.iter().map(|d| d.as_str()).collect();
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "aggregate_failed", err.to_string())
            .with_details(json!(err.errors))
            .with_extra("failedDatasets", json!(failed))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code,
            "message": self.message,
            "timestamp": timestamp(),
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        if let Some((key, value)) = self.extra {
            body[key] = value;
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": timestamp() }))
}

async fn roster(State(state): State<Arc<AppState>>) -> ApiResult {
    let result = state.aggregator.roster().await;
    if !result.succeeded() {
        warn!(errors = result.errors.len(), "roster request failed");
        return Err(ApiError::from_dataset("roster_unavailable", &result));
    }
    Ok(Json(json!({
        "players": result.records,
        "count": result.records.len(),
        "source": result.successful_adapter,
        "dataType": "college_roster",
        "errors": result.errors,
        "timestamp": timestamp(),
    })))
}

async fn recruiting(
    State(state): State<Arc<AppState>>,
    Path(class_year): Path<String>,
) -> ApiResult {
    let class_year = class_year
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|y| (2000..=2100).contains(y))
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_class_year",
                format!("class year must be a number between 2000 and 2100, got {class_year:?}"),
            )
        })?;

    let result = state.aggregator.recruiting(class_year).await;
    if !result.succeeded() {
        return Err(ApiError::from_dataset("recruiting_unavailable", &result));
    }
    Ok(Json(json!({
        "recruits": result.records,
        "count": result.records.len(),
        "class": class_year,
        "source": result.successful_adapter,
        "errors": result.errors,
        "timestamp": timestamp(),
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct HsStatsParams {
    pub state: Option<String>,
}

async fn hs_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HsStatsParams>,
) -> ApiResult {
    let filter = params
        .state
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty());
    let result = state.aggregator.hs_stats(filter).await;
    if !result.succeeded() {
        return Err(ApiError::from_dataset("hs_stats_unavailable", &result));
    }
    Ok(Json(json!({
        "players": result.records,
        "count": result.records.len(),
        "source": result.successful_adapter,
        "errors": result.errors,
        "timestamp": timestamp(),
    })))
}

async fn team_rating(
    State(state): State<Arc<AppState>>,
    Path(team_name): Path<String>,
) -> ApiResult {
    let team = team_name.trim();
    if team.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalid_team", "team name is required"));
    }
    let result = state.aggregator.team_rating(team).await;
    let Some(rating) = result.records.first() else {
        // A table that parsed but had no matching row shows up as a single
        // "empty" error; anything else means the source itself failed.
        let not_found = !result.errors.is_empty()
            && result
                .errors
                .iter()
                .all(|e| e.kind == FetchErrorKind::Empty);
        if not_found {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                "team_not_found",
                format!("no rating found for team {team:?}"),
            ));
        }
        return Err(ApiError::from_dataset("team_rating_unavailable", &result));
    };
    Ok(Json(json!({
        "team": rating.team,
        "ranking": rating.ranking,
        "rating": rating.rating,
        "offense": rating.offense,
        "defense": rating.defense,
        "conference": rating.conference,
        "source": result.successful_adapter,
        "timestamp": timestamp(),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateParams {
    pub class_year: Option<u16>,
    pub state: Option<String>,
}

async fn aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregateParams>,
) -> ApiResult {
    let query = SourceQuery {
        class_year: params.class_year.filter(|y| (2000..=2100).contains(y)),
        state: params
            .state
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty()),
        team: None,
    };
    let report = state.aggregator.aggregate(&query).await?;
    info!(
        players = report.summary.total_players,
        succeeded = report.summary.datasets_succeeded,
        "served aggregate"
    );
    Ok(Json(json!(report)))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}
