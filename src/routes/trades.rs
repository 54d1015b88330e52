use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::catalog::{self, TradeDef};
use crate::domain::{AddTradeRequest, Classification, TradeAssignment};
use crate::error::ApiResult;
use crate::pipeline::CompletenessResult;
use crate::services::cache::keys;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    pub classification: Classification,
    pub assignments: Vec<TradeAssignment>,
    pub cached: bool,
}

/// Classify the project's trades and assign them as detected
///
/// The classifier output is cached per project until facts are re-extracted.
pub async fn classify_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<ClassifyResponse>> {
    let key = keys::classification(project_id);

    let (classification, cached) = match state.cache.get::<Classification>(&key).await {
        Some(hit) => (hit, true),
        None => {
            let fresh = state.pipeline.classify(project_id).await?;
            if let Err(e) = state.cache.set(&key, &fresh).await {
                tracing::warn!(error = %e, %project_id, "Failed to cache classification");
            }
            (fresh, false)
        }
    };
    let assignments = state
        .pipeline
        .assign_detected(project_id, &classification)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        %project_id,
        trades = assignments.len(),
        cached,
        "Project classified"
    );
    Ok(DataResponse::new(ClassifyResponse {
        classification,
        assignments,
        cached,
    }))
}

pub async fn list_trades(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<TradeAssignment>>> {
    Ok(DataResponse::new(state.pipeline.trades(project_id).await?))
}

pub async fn add_trade(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddTradeRequest>,
) -> ApiResult<DataResponse<Vec<TradeAssignment>>> {
    Ok(DataResponse::new(
        state.pipeline.add_trade(project_id, req).await?,
    ))
}

/// Suggest and assign trades the intake answers point to
pub async fn recommend_trades(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<TradeAssignment>>> {
    Ok(DataResponse::new(
        state.pipeline.recommend_trades(project_id).await?,
    ))
}

pub async fn completeness(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
) -> ApiResult<DataResponse<CompletenessResult>> {
    Ok(DataResponse::new(
        state.pipeline.score(project_id, &trade_code).await?,
    ))
}

/// The fixed trade catalog - public
pub async fn catalog() -> DataResponse<Vec<&'static TradeDef>> {
    DataResponse::new(catalog::classifiable().collect())
}
