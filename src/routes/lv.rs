use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{Lv, LvMutation};
use crate::error::ApiResult;

/// Draft the LV from the trade's latest answers
pub async fn generate_lv(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
) -> ApiResult<DataResponse<Lv>> {
    tracing::info!(user_id = %auth.user_id, %project_id, trade = %trade_code, "Generating LV");
    Ok(DataResponse::new(
        state.pipeline.generate_lv(project_id, &trade_code).await?,
    ))
}

pub async fn get_lv(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
) -> ApiResult<DataResponse<Lv>> {
    Ok(DataResponse::new(
        state.pipeline.lv(project_id, &trade_code).await?,
    ))
}

/// Apply one add/edit/delete/replace mutation
pub async fn mutate_lv(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
    Json(mutation): Json<LvMutation>,
) -> ApiResult<DataResponse<Lv>> {
    Ok(DataResponse::new(
        state
            .pipeline
            .mutate_lv(project_id, &trade_code, mutation)
            .await?,
    ))
}
