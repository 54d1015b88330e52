//! The adaptive specification pipeline.
//!
//! Stages: trade classification, completeness scoring, question
//! orchestration, assumption resolution and LV assembly. [`Pipeline`] runs
//! them against a [`FactStore`](crate::store::FactStore); the stage functions
//! re-exported here are usable on their own.

pub mod assembler;
pub mod assumptions;
pub mod classifier;
pub mod completeness;
pub mod facts;
pub mod filters;
pub mod prompts;
pub mod questions;
pub mod service;
pub mod text;

pub use assembler::assemble_lv;
pub use assumptions::{resolve_answer, Resolution};
pub use classifier::classify_trades;
pub use completeness::{score_completeness, CompletenessResult};
pub use questions::{generate_questions, QuestionRequest};
pub use service::{trade_def, Pipeline, TradeQuestionSet};
