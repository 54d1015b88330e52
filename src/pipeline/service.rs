//! The pipeline service: ties the stages to the Fact Store.
//!
//! Every write for a (project, trade) happens under that pair's lock. Oracle
//! calls never run under a lock; the deterministic half re-reads the latest
//! facts after re-acquiring it.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::assembler::{self, positions_from_values};
use super::assumptions::resolve_answer;
use super::classifier;
use super::completeness::CompletenessResult;
use super::facts::extract_facts;
use super::prompts::{self, AnsweredQuestion};
use super::questions::{
    accept_drafts, draft_questions, scope_question, scope_question_id, QuestionRequest,
};
use crate::catalog::{self, TradeDef, INTAKE_CODE};
use crate::domain::{
    AddTradeRequest, Answer, AnswerInput, Classification, CreateProjectRequest, ExtractedFacts,
    Lv, LvMutation, PriorAnswer, Project, ProjectContext, Provenance, Question, TradeAssignment,
};
use crate::error::{PipelineError, PipelineResult};
use crate::oracle::{repair, OracleRouter, TaskKind};
use crate::store::{FactStore, KeyedLocks};

/// Questions generated for one trade.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQuestionSet {
    pub trade_code: String,
    pub questions: Vec<Question>,
}

/// Facts read for one generation run.
struct Snapshot {
    context: ProjectContext,
    facts: ExtractedFacts,
    provenance: Option<Provenance>,
    intake_answers: Vec<PriorAnswer>,
    siblings: Vec<String>,
    scope_answer: Option<String>,
}

impl Snapshot {
    fn request(&self, project_id: Uuid, trade: &'static TradeDef) -> QuestionRequest<'_> {
        QuestionRequest {
            project_id,
            trade,
            provenance: self.provenance,
            context: &self.context,
            facts: &self.facts,
            intake_answers: &self.intake_answers,
            siblings: &self.siblings,
            scope_answer: self.scope_answer.as_deref(),
        }
    }
}

/// Resolve a trade code against the catalog, case-insensitively.
pub fn trade_def(code: &str) -> PipelineResult<&'static TradeDef> {
    catalog::lookup(Some(code), None)
        .ok_or_else(|| PipelineError::not_found(format!("trade {}", code.trim())))
}

#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn FactStore>,
    router: OracleRouter,
    locks: KeyedLocks,
}

impl Pipeline {
    pub fn new(store: Arc<dyn FactStore>, router: OracleRouter) -> Self {
        Self {
            store,
            router,
            locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    pub fn router(&self) -> &OracleRouter {
        &self.router
    }

    // =========================================================================
    // Projects
    // =========================================================================

    #[instrument(skip_all)]
    pub async fn create_project(&self, req: CreateProjectRequest) -> PipelineResult<Project> {
        let description = req.description.trim();
        if description.is_empty() {
            return Err(PipelineError::validation("description must not be empty"));
        }
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            description: description.to_string(),
            category: req.category,
            sub_category: req.sub_category,
            timeframe: req.timeframe,
            budget: req.budget,
            extracted_facts: extract_facts(description),
            created_at: now,
            updated_at: now,
        };
        self.store.create_project(&project).await?;
        info!(
            project_id = %project.id,
            measures = project.extracted_facts.measures.len(),
            rooms = project.extracted_facts.rooms.len(),
            "Project created"
        );
        Ok(project)
    }

    pub async fn project(&self, project_id: Uuid) -> PipelineResult<Project> {
        self.store
            .project(project_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("project {project_id}")))
    }

    /// Derive the extracted facts again from the stored description.
    #[instrument(skip(self))]
    pub async fn reextract_facts(&self, project_id: Uuid) -> PipelineResult<ExtractedFacts> {
        let project = self.project(project_id).await?;
        let facts = extract_facts(&project.description);
        self.store.update_extracted_facts(project_id, &facts).await?;
        info!(%project_id, "Facts re-extracted");
        Ok(facts)
    }

    // =========================================================================
    // Trades
    // =========================================================================

    /// Run the classifier without touching assignments.
    pub async fn classify(&self, project_id: Uuid) -> PipelineResult<Classification> {
        let project = self.project(project_id).await?;
        classifier::classify_trades(
            &self.router,
            &ProjectContext::from(&project),
            &project.extracted_facts,
        )
        .await
    }

    /// Store a classification as `detected` assignments.
    pub async fn assign_detected(
        &self,
        project_id: Uuid,
        classification: &Classification,
    ) -> PipelineResult<Vec<TradeAssignment>> {
        let now = Utc::now();
        let assignments: Vec<_> = classification
            .trades
            .iter()
            .map(|t| TradeAssignment {
                project_id,
                trade_code: t.code.clone(),
                provenance: Provenance::Detected,
                confidence: Some(t.confidence),
                created_at: now,
            })
            .collect();
        self.store.assign_trades(project_id, &assignments).await
    }

    pub async fn classify_project(
        &self,
        project_id: Uuid,
    ) -> PipelineResult<(Classification, Vec<TradeAssignment>)> {
        let classification = self.classify(project_id).await?;
        let assignments = self.assign_detected(project_id, &classification).await?;
        Ok((classification, assignments))
    }

    #[instrument(skip(self, req), fields(code = %req.code))]
    pub async fn add_trade(
        &self,
        project_id: Uuid,
        req: AddTradeRequest,
    ) -> PipelineResult<Vec<TradeAssignment>> {
        let trade = trade_def(&req.code)?;
        if trade.is_intake() {
            return Err(PipelineError::not_found(format!("trade {}", trade.code)));
        }
        self.project(project_id).await?;
        let provenance = if req.after_confirmation {
            Provenance::Additional
        } else {
            Provenance::Manual
        };
        let assignment = TradeAssignment {
            project_id,
            trade_code: trade.code.to_string(),
            provenance,
            confidence: None,
            created_at: Utc::now(),
        };
        let all = self.store.assign_trades(project_id, &[assignment]).await?;
        info!(%project_id, trade = trade.code, %provenance, "Trade added");
        Ok(all)
    }

    pub async fn trades(&self, project_id: Uuid) -> PipelineResult<Vec<TradeAssignment>> {
        self.project(project_id).await?;
        self.store.trade_assignments(project_id).await
    }

    /// Ask for trades the intake answers suggest, and store them as `ai_recommended`.
    #[instrument(skip(self))]
    pub async fn recommend_trades(&self, project_id: Uuid) -> PipelineResult<Vec<TradeAssignment>> {
        let project = self.project(project_id).await?;
        let assigned: Vec<String> = self
            .store
            .trade_assignments(project_id)
            .await?
            .into_iter()
            .map(|a| a.trade_code)
            .collect();
        let intake = self.answered(project_id, INTAKE_CODE).await?;
        let intake: Vec<PriorAnswer> = intake.into_iter().map(|(q, a)| prior(&q, &a)).collect();

        let candidates = classifier::recommend_trades(
            &self.router,
            &ProjectContext::from(&project),
            &intake,
            &assigned,
        )
        .await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let assignments: Vec<_> = candidates
            .iter()
            .map(|c| TradeAssignment {
                project_id,
                trade_code: c.code.clone(),
                provenance: Provenance::AiRecommended,
                confidence: Some(c.confidence),
                created_at: now,
            })
            .collect();
        let all = self.store.assign_trades(project_id, &assignments).await?;
        info!(%project_id, recommended = candidates.len(), "Trades recommended");
        Ok(all
            .into_iter()
            .filter(|a| candidates.iter().any(|c| c.code == a.trade_code))
            .collect())
    }

    async fn assignment(
        &self,
        project_id: Uuid,
        trade: &TradeDef,
    ) -> PipelineResult<(TradeAssignment, Vec<TradeAssignment>)> {
        let all = self.store.trade_assignments(project_id).await?;
        let own = all
            .iter()
            .find(|a| a.trade_code == trade.code)
            .cloned()
            .ok_or_else(|| {
                PipelineError::not_found(format!(
                    "trade {} is not assigned to project {project_id}",
                    trade.code
                ))
            })?;
        Ok((own, all))
    }

    // =========================================================================
    // Questions
    // =========================================================================

    /// Questions of a trade with their answers, in question order.
    async fn answered(
        &self,
        project_id: Uuid,
        trade: &str,
    ) -> PipelineResult<Vec<(Question, Answer)>> {
        let questions = self.store.questions(project_id, trade).await?;
        let mut answers: HashMap<String, Answer> = self
            .store
            .answers(project_id, trade)
            .await?
            .into_iter()
            .map(|a| (a.question_id.clone(), a))
            .collect();
        Ok(questions
            .into_iter()
            .filter_map(|q| answers.remove(&q.id).map(|a| (q, a)))
            .collect())
    }

    async fn snapshot(
        &self,
        project_id: Uuid,
        trade: &'static TradeDef,
    ) -> PipelineResult<Snapshot> {
        let project = self.project(project_id).await?;
        let context = ProjectContext::from(&project);

        if trade.is_intake() {
            return Ok(Snapshot {
                context,
                facts: project.extracted_facts,
                provenance: None,
                intake_answers: Vec::new(),
                siblings: Vec::new(),
                scope_answer: None,
            });
        }

        let (own, all) = self.assignment(project_id, trade).await?;
        let intake_answers = self
            .answered(project_id, INTAKE_CODE)
            .await?
            .into_iter()
            .map(|(q, a)| prior(&q, &a))
            .collect();
        let scope_id = scope_question_id(trade.code);
        let scope_answer = self
            .store
            .answers(project_id, trade.code)
            .await?
            .into_iter()
            .find(|a| a.question_id == scope_id)
            .map(|a| a.answer);

        Ok(Snapshot {
            context,
            facts: project.extracted_facts,
            provenance: Some(own.provenance),
            intake_answers,
            siblings: all.into_iter().map(|a| a.trade_code).collect(),
            scope_answer,
        })
    }

    pub async fn score(&self, project_id: Uuid, trade_code: &str) -> PipelineResult<CompletenessResult> {
        let trade = trade_def(trade_code)?;
        let snapshot = self.snapshot(project_id, trade).await?;
        Ok(snapshot.request(project_id, trade).completeness())
    }

    /// Generate and store the question set of one trade.
    ///
    /// The facts are read under the trade's lock, the oracle is called without
    /// it, and the filters run against facts re-read under the lock again.
    #[instrument(skip(self))]
    pub async fn generate_questions(
        &self,
        project_id: Uuid,
        trade_code: &str,
    ) -> PipelineResult<Vec<Question>> {
        let trade = trade_def(trade_code)?;

        let snapshot = {
            let _guard = self.locks.lock(project_id, trade.code).await;
            self.snapshot(project_id, trade).await?
        };
        let drafts = {
            let req = snapshot.request(project_id, trade);
            if req.awaits_scope() {
                None
            } else {
                let completeness = req.completeness();
                Some(draft_questions(&self.router, &req, &completeness).await?)
            }
        };

        let _guard = self.locks.lock(project_id, trade.code).await;
        let latest = self.snapshot(project_id, trade).await?;
        let req = latest.request(project_id, trade);
        let questions = match drafts {
            Some(drafts) if !req.awaits_scope() => {
                accept_drafts(drafts, &req, &req.completeness())?
            }
            _ => vec![scope_question(project_id, trade)],
        };
        self.store
            .replace_questions(project_id, trade.code, &questions)
            .await?;
        Ok(questions)
    }

    pub async fn intake_questions(&self, project_id: Uuid) -> PipelineResult<Vec<Question>> {
        self.generate_questions(project_id, INTAKE_CODE).await
    }

    /// Generate questions for every assigned trade concurrently.
    pub async fn generate_all(&self, project_id: Uuid) -> PipelineResult<Vec<TradeQuestionSet>> {
        let codes: Vec<String> = self
            .trades(project_id)
            .await?
            .into_iter()
            .map(|a| a.trade_code)
            .collect();
        let runs = codes.iter().map(|code| async move {
            self.generate_questions(project_id, code)
                .await
                .map(|questions| TradeQuestionSet {
                    trade_code: code.clone(),
                    questions,
                })
        });
        join_all(runs).await.into_iter().collect()
    }

    pub async fn questions(&self, project_id: Uuid, trade_code: &str) -> PipelineResult<Vec<Question>> {
        let trade = trade_def(trade_code)?;
        self.store.questions(project_id, trade.code).await
    }

    // =========================================================================
    // Answers
    // =========================================================================

    /// Resolve and store a batch of answers. Nothing is stored if any
    /// question is unknown.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn save_answers(
        &self,
        project_id: Uuid,
        trade_code: &str,
        inputs: Vec<AnswerInput>,
    ) -> PipelineResult<Vec<Answer>> {
        let trade = trade_def(trade_code)?;
        if inputs.is_empty() {
            return Err(PipelineError::validation("no answers given"));
        }
        let now = Utc::now();
        let answers: Vec<Answer> = inputs
            .into_iter()
            .map(|input| {
                let resolution = resolve_answer(&input.answer);
                Answer {
                    project_id,
                    trade_code: trade.code.to_string(),
                    question_id: input.question_id,
                    answer: resolution.final_answer,
                    assumption: resolution.assumption,
                    updated_at: now,
                }
            })
            .collect();

        let _guard = self.locks.lock(project_id, trade.code).await;
        self.project(project_id).await?;
        self.store
            .upsert_answers(project_id, trade.code, &answers)
            .await?;
        let assumed = answers.iter().filter(|a| a.assumption.is_some()).count();
        info!(%project_id, trade = trade.code, saved = answers.len(), assumed, "Answers saved");
        Ok(answers)
    }

    pub async fn answers(&self, project_id: Uuid, trade_code: &str) -> PipelineResult<Vec<Answer>> {
        let trade = trade_def(trade_code)?;
        self.store.answers(project_id, trade.code).await
    }

    // =========================================================================
    // LV
    // =========================================================================

    /// Draft the LV of a trade from its latest answers and store it.
    #[instrument(skip(self))]
    pub async fn generate_lv(&self, project_id: Uuid, trade_code: &str) -> PipelineResult<Lv> {
        let trade = trade_def(trade_code)?;
        if trade.is_intake() {
            return Err(PipelineError::validation("the intake phase has no LV"));
        }
        let project = self.project(project_id).await?;
        self.assignment(project_id, trade).await?;

        let (intake, answered) = {
            let _guard = self.locks.lock(project_id, trade.code).await;
            let intake: Vec<PriorAnswer> = self
                .answered(project_id, INTAKE_CODE)
                .await?
                .into_iter()
                .map(|(q, a)| prior(&q, &a))
                .collect();
            let pairs = self.answered(project_id, trade.code).await?;
            let given: HashMap<String, String> = pairs
                .iter()
                .map(|(q, a)| (q.id.clone(), a.answer.clone()))
                .collect();
            // Answers to questions whose condition no longer holds are stale.
            let answered: Vec<AnsweredQuestion> = pairs
                .into_iter()
                .filter(|(q, _)| q.is_visible(&given))
                .map(|(q, a)| AnsweredQuestion {
                    question: q.text,
                    answer: a.answer,
                    assumption: a.assumption,
                })
                .collect();
            (intake, answered)
        };

        let mut assumptions: Vec<String> = Vec::new();
        for a in &answered {
            if let Some(note) = &a.assumption {
                let line = format!("{}: {}", a.question.trim(), note);
                if !assumptions.contains(&line) {
                    assumptions.push(line);
                }
            }
        }

        let task = TaskKind::LvGeneration;
        let (system, user) =
            prompts::lv_generation(trade, &ProjectContext::from(&project), &intake, &answered);
        let raw = self.router.complete(task, &system, &user).await?;
        let items = repair::parse_json_array(&raw)
            .map_err(|e| PipelineError::OracleMalformedOutput(format!("{task}: {e}")))?;
        let positions = positions_from_values(&items);
        if positions.is_empty() {
            return Err(PipelineError::validation(format!(
                "LV generation for trade {} produced no positions",
                trade.code
            )));
        }

        let _guard = self.locks.lock(project_id, trade.code).await;
        let existing = self.store.lv(project_id, trade.code).await?;
        let lv = assembler::assemble_lv(
            existing,
            project_id,
            trade.code,
            LvMutation::Create {
                positions,
                assumptions,
            },
        )?;
        self.store.save_lv(&lv).await?;
        info!(
            %project_id,
            trade = trade.code,
            positions = lv.positions.len(),
            total_sum = %lv.total_sum,
            assumptions = lv.assumptions.len(),
            "LV generated"
        );
        Ok(lv)
    }

    /// Apply one mutation to a stored LV.
    #[instrument(skip(self, mutation), fields(op = mutation.name()))]
    pub async fn mutate_lv(
        &self,
        project_id: Uuid,
        trade_code: &str,
        mutation: LvMutation,
    ) -> PipelineResult<Lv> {
        let trade = trade_def(trade_code)?;
        let _guard = self.locks.lock(project_id, trade.code).await;
        let existing = self.store.lv(project_id, trade.code).await?;
        let lv = assembler::assemble_lv(existing, project_id, trade.code, mutation)?;
        self.store.save_lv(&lv).await?;
        Ok(lv)
    }

    pub async fn lv(&self, project_id: Uuid, trade_code: &str) -> PipelineResult<Lv> {
        let trade = trade_def(trade_code)?;
        self.store
            .lv(project_id, trade.code)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("LV for trade {}", trade.code)))
    }
}

fn prior(question: &Question, answer: &Answer) -> PriorAnswer {
    PriorAnswer {
        question: question.text.clone(),
        answer: answer.answer.clone(),
    }
}
