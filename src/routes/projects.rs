use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{CreateProjectRequest, ExtractedFacts, Project};
use crate::error::ApiResult;
use crate::services::cache::keys;

/// Create a project; facts are extracted from the description once
pub async fn create_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Created<Project>> {
    tracing::info!(user_id = %auth.user_id, "Creating project");
    let project = state.pipeline.create_project(req).await?;
    Ok(Created(project))
}

pub async fn get_project(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Project>> {
    Ok(DataResponse::new(state.pipeline.project(project_id).await?))
}

/// Re-derive the extracted facts and drop the cached classification
pub async fn reextract_facts(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<ExtractedFacts>> {
    tracing::info!(user_id = %auth.user_id, %project_id, "Re-extracting facts");
    let facts = state.pipeline.reextract_facts(project_id).await?;
    if let Err(e) = state.cache.delete(&keys::classification(project_id)).await {
        tracing::warn!(error = %e, %project_id, "Failed to invalidate classification cache");
    }
    Ok(DataResponse::new(facts))
}
