//! Fact Store boundary.
//!
//! Persistence of projects, trade assignments, questions, answers and LVs
//! as composite-key upserts. [`PgFactStore`] backs the server,
//! [`MemoryFactStore`] backs tests and local runs.

pub mod locks;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Answer, ExtractedFacts, Lv, Project, Question, TradeAssignment};
use crate::error::PipelineResult;

pub use locks::{KeyGuard, KeyedLocks};
pub use memory::MemoryFactStore;
pub use postgres::PgFactStore;

#[async_trait]
pub trait FactStore: Send + Sync {
    async fn create_project(&self, project: &Project) -> PipelineResult<()>;

    async fn project(&self, project_id: Uuid) -> PipelineResult<Option<Project>>;

    /// Explicit re-extraction. Fails with `NotFound` for unknown projects.
    async fn update_extracted_facts(
        &self,
        project_id: Uuid,
        facts: &ExtractedFacts,
    ) -> PipelineResult<()>;

    /// Insert trade assignments. Existing assignments keep their provenance.
    /// Returns the project's full assignment list.
    async fn assign_trades(
        &self,
        project_id: Uuid,
        assignments: &[TradeAssignment],
    ) -> PipelineResult<Vec<TradeAssignment>>;

    async fn trade_assignments(&self, project_id: Uuid) -> PipelineResult<Vec<TradeAssignment>>;

    /// Questions of a (project, trade), ordered by position.
    async fn questions(&self, project_id: Uuid, trade: &str) -> PipelineResult<Vec<Question>>;

    /// Upsert `questions` and delete unanswered questions missing from the
    /// new set, in one transaction.
    async fn replace_questions(
        &self,
        project_id: Uuid,
        trade: &str,
        questions: &[Question],
    ) -> PipelineResult<()>;

    async fn answers(&self, project_id: Uuid, trade: &str) -> PipelineResult<Vec<Answer>>;

    /// Upsert all answers or none. Unknown question ids fail with `NotFound`.
    async fn upsert_answers(
        &self,
        project_id: Uuid,
        trade: &str,
        answers: &[Answer],
    ) -> PipelineResult<()>;

    async fn lv(&self, project_id: Uuid, trade: &str) -> PipelineResult<Option<Lv>>;

    async fn save_lv(&self, lv: &Lv) -> PipelineResult<()>;
}
