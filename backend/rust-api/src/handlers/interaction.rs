use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::EngineError,
    extractors::AppJson,
    models::progress::{SetInteractionRequest, SetInteractionResponse},
    services::{interaction_service::InteractionService, AppState},
};

/// PUT /api/v1/modules/{id}/interaction
pub async fn set_interaction(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
    AppJson(request): AppJson<SetInteractionRequest>,
) -> Result<Json<SetInteractionResponse>, EngineError> {
    tracing::info!(
        "Interaction for user {} in module {}: liked={}, pinned={}",
        request.user_id,
        module_id,
        request.liked,
        request.pinned
    );

    let service = InteractionService::new(state.mongo.clone());
    let response = service
        .set_interaction(&request.user_id, &module_id, request.liked, request.pinned)
        .await?;
    Ok(Json(response))
}
