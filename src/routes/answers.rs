use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{Answer, SaveAnswersRequest};
use crate::error::ApiResult;

/// Save a batch of answers; uncertain ones are replaced by a stated default
pub async fn save_answers(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
    Json(req): Json<SaveAnswersRequest>,
) -> ApiResult<DataResponse<Vec<Answer>>> {
    tracing::debug!(user_id = %auth.user_id, %project_id, trade = %trade_code, "Saving answers");
    let saved = state
        .pipeline
        .save_answers(project_id, &trade_code, req.answers)
        .await?;
    Ok(DataResponse::new(saved))
}

pub async fn list_answers(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
) -> ApiResult<DataResponse<Vec<Answer>>> {
    Ok(DataResponse::new(
        state.pipeline.answers(project_id, &trade_code).await?,
    ))
}
