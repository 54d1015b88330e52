use axum::extract::{Path, State};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::Question;
use crate::error::ApiResult;
use crate::pipeline::TradeQuestionSet;

pub async fn generate_intake_questions(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Question>>> {
    Ok(DataResponse::new(
        state.pipeline.intake_questions(project_id).await?,
    ))
}

/// (Re)generate the question set of one trade
pub async fn generate_trade_questions(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
) -> ApiResult<DataResponse<Vec<Question>>> {
    let questions = state
        .pipeline
        .generate_questions(project_id, &trade_code)
        .await?;
    tracing::info!(
        user_id = %auth.user_id,
        %project_id,
        trade = %trade_code,
        count = questions.len(),
        "Questions generated"
    );
    Ok(DataResponse::new(questions))
}

/// Generate question sets for every assigned trade at once
pub async fn generate_all_questions(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<TradeQuestionSet>>> {
    Ok(DataResponse::new(
        state.pipeline.generate_all(project_id).await?,
    ))
}

pub async fn list_questions(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((project_id, trade_code)): Path<(Uuid, String)>,
) -> ApiResult<DataResponse<Vec<Question>>> {
    Ok(DataResponse::new(
        state.pipeline.questions(project_id, &trade_code).await?,
    ))
}
