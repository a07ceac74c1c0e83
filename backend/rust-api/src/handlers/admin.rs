use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    error::EngineError,
    extractors::AppJson,
    models::progress::{CreateProgressRequest, ModuleProgress, PatchProgressRequest},
    services::{progress_service::ProgressService, AppState},
};

/// POST /admin/progress — explicit create; duplicates surface as Conflict.
pub async fn create_progress(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<CreateProgressRequest>,
) -> Result<(StatusCode, Json<ModuleProgress>), EngineError> {
    let service = ProgressService::new(state.mongo.clone(), state.registry.clone());
    let progress = service.create_progress(request).await?;
    Ok((StatusCode::CREATED, Json(progress)))
}

/// PATCH /admin/progress/{user_id}/{module_id}
pub async fn patch_progress(
    State(state): State<Arc<AppState>>,
    Path((user_id, module_id)): Path<(String, String)>,
    AppJson(request): AppJson<PatchProgressRequest>,
) -> Result<Json<ModuleProgress>, EngineError> {
    let service = ProgressService::new(state.mongo.clone(), state.registry.clone());
    let progress = service
        .patch_progress(&user_id, &module_id, request)
        .await?;
    Ok(Json(progress))
}
