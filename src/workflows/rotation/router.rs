use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;

use super::domain::{MemberId, ScoringSettings};
use super::repository::{EventStore, HistoryRepository, RosterRepository};
use super::roster::RosterChanges;
use super::service::{AwardEntry, RotationError, RotationService};

/// Router builder exposing rankings, scheduling, timelines, history and roster
/// endpoints.
pub fn rotation_router<S>(service: Arc<RotationService<S>>) -> Router
where
    S: EventStore + RosterRepository + HistoryRepository + 'static,
{
    Router::new()
        .route("/api/v1/rankings", get(rankings_handler::<S>))
        .route("/api/v1/schedule/auto", post(auto_schedule_handler::<S>))
        .route("/api/v1/schedule/:date/outcome", put(outcome_handler::<S>))
        .route("/api/v1/duties/:date", put(enter_duty_handler::<S>))
        .route("/api/v1/awards/:week", put(save_awards_handler::<S>))
        .route("/api/v1/recommendations", post(add_recommendation_handler::<S>))
        .route("/api/v1/power", post(record_power_handler::<S>))
        .route("/api/v1/settings", put(update_settings_handler::<S>))
        .route("/api/v1/timelines", get(timelines_handler::<S>))
        .route("/api/v1/members/stats", get(member_stats_handler::<S>))
        .route("/api/v1/members/import", post(import_preview_handler::<S>))
        .route(
            "/api/v1/members/import/confirm",
            post(import_confirm_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RankingsQuery {
    #[serde(default)]
    pub(crate) date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AutoScheduleRequest {
    pub(crate) start_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TimelinesQuery {
    #[serde(default)]
    pub(crate) months: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutcomeRequest {
    pub(crate) conductor_showed_up: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DutyEntryRequest {
    pub(crate) conductor_id: MemberId,
    #[serde(default)]
    pub(crate) backup_id: Option<MemberId>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeekAwardsRequest {
    #[serde(default)]
    pub(crate) awards: Vec<AwardEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationRequest {
    pub(crate) member_id: MemberId,
    pub(crate) author: String,
    #[serde(default)]
    pub(crate) note: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PowerRequest {
    pub(crate) member_id: MemberId,
    pub(crate) power: i64,
}

pub(crate) async fn rankings_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    Query(query): Query<RankingsQuery>,
) -> Response
where
    S: EventStore + 'static,
{
    let reference_date = query.date.unwrap_or_else(today);
    match service.compute_rankings(reference_date) {
        Ok(table) => (StatusCode::OK, axum::Json(table)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn auto_schedule_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    axum::Json(request): axum::Json<AutoScheduleRequest>,
) -> Response
where
    S: EventStore + 'static,
{
    match service.auto_schedule(request.start_date) {
        Ok(schedule) => (StatusCode::OK, axum::Json(schedule)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn timelines_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    Query(query): Query<TimelinesQuery>,
) -> Response
where
    S: EventStore + 'static,
{
    let months = query
        .months
        .filter(|months| *months > 0)
        .and_then(|months| u32::try_from(months).ok())
        .unwrap_or(0);
    match service.compute_timelines(months, today()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn outcome_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    Path(date): Path<String>,
    axum::Json(request): axum::Json<OutcomeRequest>,
) -> Response
where
    S: EventStore + 'static,
{
    let date = match parse_path_date(&date) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match service.record_outcome(date, request.conductor_showed_up) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn enter_duty_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    Path(date): Path<String>,
    axum::Json(request): axum::Json<DutyEntryRequest>,
) -> Response
where
    S: EventStore + 'static,
{
    let date = match parse_path_date(&date) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match service.enter_duty(date, request.conductor_id, request.backup_id, request.notes) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn save_awards_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    Path(week): Path<String>,
    axum::Json(request): axum::Json<WeekAwardsRequest>,
) -> Response
where
    S: EventStore + HistoryRepository + 'static,
{
    let week = match parse_path_date(&week) {
        Ok(week) => week,
        Err(response) => return response,
    };

    match service.save_week_awards(week, request.awards) {
        Ok(awards) => (StatusCode::OK, axum::Json(awards)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn add_recommendation_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    axum::Json(request): axum::Json<RecommendationRequest>,
) -> Response
where
    S: EventStore + HistoryRepository + 'static,
{
    match service.add_recommendation(request.member_id, &request.author, &request.note, now()) {
        Ok(recommendation) => (StatusCode::CREATED, axum::Json(recommendation)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn record_power_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    axum::Json(request): axum::Json<PowerRequest>,
) -> Response
where
    S: EventStore + HistoryRepository + 'static,
{
    match service.record_power(request.member_id, request.power, now()) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn update_settings_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    axum::Json(settings): axum::Json<ScoringSettings>,
) -> Response
where
    S: EventStore + HistoryRepository + 'static,
{
    match service.update_settings(settings) {
        Ok(settings) => (StatusCode::OK, axum::Json(settings)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn member_stats_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
) -> Response
where
    S: EventStore + 'static,
{
    match service.member_duty_summaries() {
        Ok(summaries) => (StatusCode::OK, axum::Json(summaries)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn import_preview_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    body: String,
) -> Response
where
    S: EventStore + 'static,
{
    match service.preview_roster_import(Cursor::new(body.into_bytes())) {
        Ok(preview) => (StatusCode::OK, axum::Json(preview)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

pub(crate) async fn import_confirm_handler<S>(
    State(service): State<Arc<RotationService<S>>>,
    axum::Json(changes): axum::Json<RosterChanges>,
) -> Response
where
    S: EventStore + RosterRepository + 'static,
{
    match service.confirm_roster_import(&changes) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => rotation_error_response(error),
    }
}

fn rotation_error_response(error: RotationError) -> Response {
    let status = match &error {
        RotationError::InsufficientCandidates { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RotationError::NotFound(_) => StatusCode::NOT_FOUND,
        RotationError::Roster(_) | RotationError::Invalid(_) => StatusCode::BAD_REQUEST,
        RotationError::ContextLoad(_) | RotationError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn parse_path_date(raw: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        let payload = json!({
            "error": format!("'{raw}' is not a YYYY-MM-DD date"),
        });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
