//! Postgres-backed fact store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::FactStore;
use crate::domain::{
    Answer, ExtractedFacts, Lv, LvValidation, Position, Project, Provenance, Question,
    QuestionOrigin, QuestionType, TradeAssignment,
};
use crate::error::{PipelineError, PipelineResult};

#[derive(Clone)]
pub struct PgFactStore {
    pool: PgPool,
}

impl PgFactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    description: String,
    category: Option<String>,
    sub_category: Option<String>,
    timeframe: Option<String>,
    budget: Option<String>,
    extracted_facts: Json<ExtractedFacts>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            category: row.category,
            sub_category: row.sub_category,
            timeframe: row.timeframe,
            budget: row.budget,
            extracted_facts: row.extracted_facts.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    project_id: Uuid,
    trade_code: String,
    provenance: String,
    confidence: Option<f64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for TradeAssignment {
    type Error = PipelineError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let provenance = Provenance::parse(&row.provenance).ok_or_else(|| {
            PipelineError::Internal(anyhow::anyhow!(
                "unknown provenance '{}' for trade {}",
                row.provenance,
                row.trade_code
            ))
        })?;
        Ok(Self {
            project_id: row.project_id,
            trade_code: row.trade_code,
            provenance,
            confidence: row.confidence,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuestionRow {
    project_id: Uuid,
    trade_code: String,
    question_id: String,
    position: i32,
    text: String,
    kind: String,
    required: bool,
    options: Json<Vec<String>>,
    unit: Option<String>,
    depends_on: Option<String>,
    show_if: Option<String>,
    origin: String,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.question_id,
            project_id: row.project_id,
            trade_code: row.trade_code,
            position: u32::try_from(row.position).unwrap_or_default(),
            text: row.text,
            kind: QuestionType::parse_lenient(&row.kind),
            required: row.required,
            options: row.options.0,
            unit: row.unit,
            depends_on: row.depends_on,
            show_if: row.show_if,
            origin: QuestionOrigin::parse(&row.origin).unwrap_or_default(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AnswerRow {
    project_id: Uuid,
    trade_code: String,
    question_id: String,
    answer: String,
    assumption: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Self {
            project_id: row.project_id,
            trade_code: row.trade_code,
            question_id: row.question_id,
            answer: row.answer,
            assumption: row.assumption,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LvRow {
    project_id: Uuid,
    trade_code: String,
    positions: Json<Vec<Position>>,
    total_sum: Decimal,
    nep_sum: Decimal,
    assumptions: Json<Vec<String>>,
    validation: Json<LvValidation>,
    updated_at: DateTime<Utc>,
}

impl From<LvRow> for Lv {
    fn from(row: LvRow) -> Self {
        Self {
            project_id: row.project_id,
            trade_code: row.trade_code,
            positions: row.positions.0,
            total_sum: row.total_sum,
            nep_sum: row.nep_sum,
            assumptions: row.assumptions.0,
            validation: row.validation.0,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FactStore for PgFactStore {
    async fn create_project(&self, project: &Project) -> PipelineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, description, category, sub_category, timeframe, budget,
                 extracted_facts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(project.id)
        .bind(&project.description)
        .bind(&project.category)
        .bind(&project.sub_category)
        .bind(&project.timeframe)
        .bind(&project.budget)
        .bind(Json(&project.extracted_facts))
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn project(&self, project_id: Uuid) -> PipelineResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, description, category, sub_category, timeframe, budget,
                   extracted_facts, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Project::from))
    }

    async fn update_extracted_facts(
        &self,
        project_id: Uuid,
        facts: &ExtractedFacts,
    ) -> PipelineResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET extracted_facts = $2, updated_at = now() WHERE id = $1",
        )
        .bind(project_id)
        .bind(Json(facts))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::not_found(format!("project {project_id}")));
        }
        Ok(())
    }

    async fn assign_trades(
        &self,
        project_id: Uuid,
        assignments: &[TradeAssignment],
    ) -> PipelineResult<Vec<TradeAssignment>> {
        let mut tx = self.pool.begin().await?;
        for a in assignments {
            // Provenance is immutable: an existing row wins.
            sqlx::query(
                r#"
                INSERT INTO project_trades (project_id, trade_code, provenance, confidence, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (project_id, trade_code) DO NOTHING
                "#,
            )
            .bind(project_id)
            .bind(&a.trade_code)
            .bind(a.provenance.as_str())
            .bind(a.confidence)
            .bind(a.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.trade_assignments(project_id).await
    }

    async fn trade_assignments(&self, project_id: Uuid) -> PipelineResult<Vec<TradeAssignment>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT project_id, trade_code, provenance, confidence, created_at
            FROM project_trades
            WHERE project_id = $1
            ORDER BY seq
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TradeAssignment::try_from).collect()
    }

    async fn questions(&self, project_id: Uuid, trade: &str) -> PipelineResult<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT project_id, trade_code, question_id, position, text, kind, required,
                   options, unit, depends_on, show_if, origin
            FROM questions
            WHERE project_id = $1 AND trade_code = $2
            ORDER BY position, question_id
            "#,
        )
        .bind(project_id)
        .bind(trade)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn replace_questions(
        &self,
        project_id: Uuid,
        trade: &str,
        questions: &[Question],
    ) -> PipelineResult<()> {
        let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM questions q
            WHERE q.project_id = $1
              AND q.trade_code = $2
              AND NOT (q.question_id = ANY($3))
              AND NOT EXISTS (
                  SELECT 1 FROM answers a
                  WHERE a.project_id = q.project_id
                    AND a.trade_code = q.trade_code
                    AND a.question_id = q.question_id
              )
            "#,
        )
        .bind(project_id)
        .bind(trade)
        .bind(&ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for q in questions {
            sqlx::query(
                r#"
                INSERT INTO questions
                    (project_id, trade_code, question_id, position, text, kind, required,
                     options, unit, depends_on, show_if, origin)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (project_id, trade_code, question_id) DO UPDATE SET
                    position = EXCLUDED.position,
                    text = EXCLUDED.text,
                    kind = EXCLUDED.kind,
                    required = EXCLUDED.required,
                    options = EXCLUDED.options,
                    unit = EXCLUDED.unit,
                    depends_on = EXCLUDED.depends_on,
                    show_if = EXCLUDED.show_if,
                    origin = EXCLUDED.origin
                "#,
            )
            .bind(project_id)
            .bind(trade)
            .bind(&q.id)
            .bind(i32::try_from(q.position).unwrap_or(i32::MAX))
            .bind(&q.text)
            .bind(q.kind.as_str())
            .bind(q.required)
            .bind(Json(&q.options))
            .bind(&q.unit)
            .bind(&q.depends_on)
            .bind(&q.show_if)
            .bind(q.origin.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            project_id = %project_id,
            trade = trade,
            upserted = questions.len(),
            removed,
            "Questions replaced"
        );
        Ok(())
    }

    async fn answers(&self, project_id: Uuid, trade: &str) -> PipelineResult<Vec<Answer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.project_id, a.trade_code, a.question_id, a.answer, a.assumption, a.updated_at
            FROM answers a
            JOIN questions q
              ON q.project_id = a.project_id
             AND q.trade_code = a.trade_code
             AND q.question_id = a.question_id
            WHERE a.project_id = $1 AND a.trade_code = $2
            ORDER BY q.position, a.question_id
            "#,
        )
        .bind(project_id)
        .bind(trade)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Answer::from).collect())
    }

    async fn upsert_answers(
        &self,
        project_id: Uuid,
        trade: &str,
        answers: &[Answer],
    ) -> PipelineResult<()> {
        let ids: Vec<String> = answers.iter().map(|a| a.question_id.clone()).collect();
        let mut tx = self.pool.begin().await?;

        let known: HashSet<String> = sqlx::query_scalar::<_, String>(
            r#"
            SELECT question_id FROM questions
            WHERE project_id = $1 AND trade_code = $2 AND question_id = ANY($3)
            "#,
        )
        .bind(project_id)
        .bind(trade)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        if let Some(unknown) = ids.iter().find(|id| !known.contains(*id)) {
            // Dropping the transaction rolls it back.
            return Err(PipelineError::not_found(format!(
                "question {unknown} for trade {trade}"
            )));
        }

        for a in answers {
            sqlx::query(
                r#"
                INSERT INTO answers (project_id, trade_code, question_id, answer, assumption, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (project_id, trade_code, question_id) DO UPDATE SET
                    answer = EXCLUDED.answer,
                    assumption = EXCLUDED.assumption,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(project_id)
            .bind(trade)
            .bind(&a.question_id)
            .bind(&a.answer)
            .bind(&a.assumption)
            .bind(a.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn lv(&self, project_id: Uuid, trade: &str) -> PipelineResult<Option<Lv>> {
        let row = sqlx::query_as::<_, LvRow>(
            r#"
            SELECT project_id, trade_code, positions, total_sum, nep_sum,
                   assumptions, validation, updated_at
            FROM lvs
            WHERE project_id = $1 AND trade_code = $2
            "#,
        )
        .bind(project_id)
        .bind(trade)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Lv::from))
    }

    async fn save_lv(&self, lv: &Lv) -> PipelineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO lvs
                (project_id, trade_code, positions, total_sum, nep_sum,
                 assumptions, validation, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (project_id, trade_code) DO UPDATE SET
                positions = EXCLUDED.positions,
                total_sum = EXCLUDED.total_sum,
                nep_sum = EXCLUDED.nep_sum,
                assumptions = EXCLUDED.assumptions,
                validation = EXCLUDED.validation,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(lv.project_id)
        .bind(&lv.trade_code)
        .bind(Json(&lv.positions))
        .bind(lv.total_sum)
        .bind(lv.nep_sum)
        .bind(Json(&lv.assumptions))
        .bind(Json(&lv.validation))
        .bind(lv.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
