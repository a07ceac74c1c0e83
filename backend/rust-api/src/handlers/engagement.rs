use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    extractors::AppJson,
    models::session::{AddTimeRequest, DailyTimeLog, PageViewSession, StartSessionRequest},
    services::{engagement_service::EngagementService, AppState},
    utils::time::date_key,
};

fn validate_session_id(raw: &str) -> EngineResult<()> {
    Uuid::parse_str(raw)
        .map(|_| ())
        .map_err(|_| EngineError::invalid_argument(format!("Malformed session id: {}", raw)))
}

/// POST /api/v1/page-sessions
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<StartSessionRequest>,
) -> Result<(StatusCode, Json<PageViewSession>), EngineError> {
    let service = EngagementService::new(state.mongo.clone(), state.redis.clone());
    let session = service
        .start_session(&request.user_id, &request.module_id)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/v1/page-sessions/{id}/activity
pub async fn record_activity(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<PageViewSession>, EngineError> {
    validate_session_id(&session_id)?;
    let service = EngagementService::new(state.mongo.clone(), state.redis.clone());
    let session = service.record_activity(&session_id).await?;
    Ok(Json(session))
}

/// POST /api/v1/page-sessions/{id}/end
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<PageViewSession>, EngineError> {
    validate_session_id(&session_id)?;
    let service = EngagementService::new(state.mongo.clone(), state.redis.clone());
    let session = service.end_session(&session_id).await?;
    Ok(Json(session))
}

/// POST /api/v1/time-logs — direct session-time reporting.
pub async fn add_time(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<AddTimeRequest>,
) -> Result<Json<DailyTimeLog>, EngineError> {
    let date = request.date.unwrap_or_else(|| date_key(Utc::now()));
    let service = EngagementService::new(state.mongo.clone(), state.redis.clone());
    let log = service
        .add_time(&request.user_id, &date, &request.module_id, request.seconds)
        .await?;
    Ok(Json(log))
}
