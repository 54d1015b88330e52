pub mod answers;
pub mod health;
pub mod lv;
pub mod projects;
pub mod questions;
pub mod trades;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/trades", get(trades::catalog))
        // Projects
        .route("/projects", post(projects::create_project))
        .route("/projects/:project_id", get(projects::get_project))
        .route(
            "/projects/:project_id/facts/reextract",
            post(projects::reextract_facts),
        )
        // Trades
        .route(
            "/projects/:project_id/classify",
            post(trades::classify_project),
        )
        .route(
            "/projects/:project_id/trades",
            get(trades::list_trades).post(trades::add_trade),
        )
        .route(
            "/projects/:project_id/trades/recommend",
            post(trades::recommend_trades),
        )
        .route(
            "/projects/:project_id/trades/:trade_code/completeness",
            get(trades::completeness),
        )
        // Questions
        .route(
            "/projects/:project_id/intake/questions",
            post(questions::generate_intake_questions),
        )
        .route(
            "/projects/:project_id/questions",
            post(questions::generate_all_questions),
        )
        .route(
            "/projects/:project_id/trades/:trade_code/questions",
            get(questions::list_questions).post(questions::generate_trade_questions),
        )
        // Answers
        .route(
            "/projects/:project_id/trades/:trade_code/answers",
            get(answers::list_answers).put(answers::save_answers),
        )
        // LV
        .route(
            "/projects/:project_id/trades/:trade_code/lv",
            get(lv::get_lv).post(lv::generate_lv).patch(lv::mutate_lv),
        )
}
