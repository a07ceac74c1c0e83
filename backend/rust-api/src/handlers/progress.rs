use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::EngineError,
    extractors::AppJson,
    models::content::ContentRef,
    models::progress::{
        CompletedContentQuery, CompletedContentResponse, MarkViewedRequest, MarkViewedResponse,
        ModuleProgress, RecomputeRequest,
    },
    services::{progress_service::ProgressService, view_service::ViewService, AppState},
};

/// POST /api/v1/content/{kind}/{id}/view
pub async fn mark_content_viewed(
    State(state): State<Arc<AppState>>,
    Path((kind, content_id)): Path<(String, String)>,
    AppJson(request): AppJson<MarkViewedRequest>,
) -> Result<Json<MarkViewedResponse>, EngineError> {
    let reference = ContentRef::parse(&kind, &content_id)?;

    tracing::info!(
        "Marking {} {} viewed for user {}",
        reference.kind,
        reference.item_id,
        request.user_id
    );

    let service = ViewService::new(state.mongo.clone(), state.registry.clone());
    let (record, progress) = service
        .mark_viewed(&request.user_id, reference.kind, reference.item_id)
        .await?;

    Ok(Json(MarkViewedResponse::from_progress(
        &progress,
        record.viewed_at,
    )))
}

/// GET /api/v1/modules/{id}/completed-content?user_id=...
pub async fn completed_content(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
    Query(query): Query<CompletedContentQuery>,
) -> Result<Json<CompletedContentResponse>, EngineError> {
    let service = ViewService::new(state.mongo.clone(), state.registry.clone());
    let content_ids = service
        .get_completed_content_ids(&query.user_id, &module_id)
        .await?;

    Ok(Json(CompletedContentResponse {
        module_id,
        content_ids,
    }))
}

/// POST /api/v1/modules/{id}/progress/recompute
///
/// A failed recompute leaves the aggregate stale until the next relevant
/// event; this endpoint repairs it independently.
pub async fn recompute_progress(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
    AppJson(request): AppJson<RecomputeRequest>,
) -> Result<Json<ModuleProgress>, EngineError> {
    let service = ProgressService::new(state.mongo.clone(), state.registry.clone());
    let progress = service
        .update_progress(&request.user_id, &module_id)
        .await?;
    Ok(Json(progress))
}
