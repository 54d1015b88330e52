//! Question orchestration.
//!
//! Generation is split in two halves so the caller can hold the per-trade
//! lock around the deterministic half only: [`draft_questions`] talks to the
//! oracle, [`accept_drafts`] runs every filter and assigns ids.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::completeness::{self, CompletenessResult};
use super::facts::KnownFacts;
use super::filters::{self, Draft};
use super::prompts::{self, TradeQuestionPrompt};
use crate::catalog::TradeDef;
use crate::domain::{
    ExtractedFacts, PriorAnswer, ProjectContext, Provenance, Question, QuestionOrigin,
    QuestionType,
};
use crate::error::{PipelineError, PipelineResult};
use crate::oracle::repair::{self, RepairError};
use crate::oracle::{OracleRouter, TaskKind};

/// Everything one generation run for a (project, trade) may look at.
#[derive(Debug, Clone, Copy)]
pub struct QuestionRequest<'a> {
    pub project_id: Uuid,
    pub trade: &'static TradeDef,
    /// `None` for the intake phase
    pub provenance: Option<Provenance>,
    pub context: &'a ProjectContext,
    pub facts: &'a ExtractedFacts,
    pub intake_answers: &'a [PriorAnswer],
    /// Other trades assigned to the project
    pub siblings: &'a [String],
    /// Answer to the scoping question, once given
    pub scope_answer: Option<&'a str>,
}

impl QuestionRequest<'_> {
    fn task(&self) -> TaskKind {
        if self.trade.is_intake() {
            TaskKind::IntakeQuestions
        } else if self.scope_answer.is_some() {
            TaskKind::FollowUpQuestions
        } else {
            TaskKind::TradeQuestions
        }
    }

    /// Manual and AI-recommended trades wait for their scope to be described.
    pub fn awaits_scope(&self) -> bool {
        self.scope_answer.is_none()
            && self
                .provenance
                .is_some_and(Provenance::requires_scope_question)
    }

    fn prior_answers(&self) -> Vec<PriorAnswer> {
        let mut prior = self.intake_answers.to_vec();
        if let Some(answer) = self.scope_answer {
            prior.push(PriorAnswer {
                question: scope_text(self.trade),
                answer: answer.to_string(),
            });
        }
        prior
    }

    pub fn completeness(&self) -> CompletenessResult {
        completeness::score(self.trade, self.context, self.facts, &self.prior_answers())
    }
}

pub fn scope_question_id(trade_code: &str) -> String {
    format!("{trade_code}-SCOPE")
}

fn scope_text(trade: &TradeDef) -> String {
    format!(
        "Was genau soll im Gewerk {} gemacht werden? Bitte beschreiben Sie den gewünschten Umfang.",
        trade.name
    )
}

/// The single free-text question a manually added trade starts with.
pub fn scope_question(project_id: Uuid, trade: &TradeDef) -> Question {
    Question {
        id: scope_question_id(trade.code),
        project_id,
        trade_code: trade.code.to_string(),
        position: 1,
        text: scope_text(trade),
        kind: QuestionType::Text,
        required: true,
        options: Vec::new(),
        unit: None,
        depends_on: None,
        show_if: None,
        origin: QuestionOrigin::Scope,
    }
}

fn parse_drafts(task: TaskKind, raw: &str) -> PipelineResult<Vec<Draft>> {
    match repair::parse_json_array(raw) {
        Ok(items) => Ok(filters::drafts_from_values(&items)),
        Err(e @ RepairError::NotAnArray(_)) => {
            Err(PipelineError::validation(format!("{task} output: {e}")))
        }
        Err(e) => Err(PipelineError::OracleMalformedOutput(format!("{task}: {e}"))),
    }
}

/// Ask the oracle for candidate questions.
///
/// Runs without any store lock. Follow-up drafting degrades to no drafts when
/// every provider is down; every other kind propagates the outage.
#[instrument(skip_all, fields(trade = req.trade.code, project_id = %req.project_id))]
pub async fn draft_questions(
    router: &OracleRouter,
    req: &QuestionRequest<'_>,
    completeness: &CompletenessResult,
) -> PipelineResult<Vec<Draft>> {
    let task = req.task();
    let known = KnownFacts::new(req.context, req.facts, &req.prior_answers());

    let (system, user) = match task {
        TaskKind::IntakeQuestions => {
            prompts::intake_questions(req.context, &known, completeness.count)
        }
        TaskKind::FollowUpQuestions => prompts::follow_up_questions(
            req.trade,
            req.context,
            req.scope_answer.unwrap_or_default(),
            &known,
            completeness.count,
        ),
        _ => prompts::trade_questions(&TradeQuestionPrompt {
            trade: req.trade,
            context: req.context,
            known: &known,
            intake_answers: req.intake_answers,
            siblings: req.siblings,
            completeness,
        }),
    };

    let raw = match router.complete(task, &system, &user).await {
        Ok(raw) => raw,
        Err(PipelineError::OracleUnavailable { message, .. }) if task.tolerates_outage() => {
            warn!(error = %message, "Follow-up drafting skipped, oracle unavailable");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };
    parse_drafts(task, &raw)
}

/// Run the deterministic passes and assign stable ids.
///
/// Order: exact dedup, known facts, trade boundaries, project exclusions,
/// mandatory injection, truncation to the target count, dependency fixup.
/// Ids are `<TRADE>-<NN>` by final position, so unchanged facts and drafts
/// always yield the same set.
pub fn accept_drafts(
    drafts: Vec<Draft>,
    req: &QuestionRequest<'_>,
    completeness: &CompletenessResult,
) -> PipelineResult<Vec<Question>> {
    let code = req.trade.code;
    let drafted = drafts.len();
    let prior = req.prior_answers();
    let known = KnownFacts::new(req.context, req.facts, &prior);

    let mut drafts = filters::dedupe_exact(drafts);
    drafts = filters::drop_known(drafts, &known);
    if !req.trade.is_intake() {
        drafts = filters::drop_cross_trade(drafts, code, req.siblings);
    }
    let excluded = filters::excluded_elements(
        std::iter::once(req.context.description.as_str())
            .chain(prior.iter().map(|a| a.answer.as_str())),
    );
    drafts = filters::drop_excluded(drafts, &excluded);
    if req.scope_answer.is_none() {
        drafts = filters::inject_mandatory(drafts, code, &known);
    }
    drafts.truncate(completeness.count as usize);

    let edges = filters::resolve_dependencies(&mut drafts);

    let offset = u32::from(req.scope_answer.is_some());
    let id_at = |index: usize| format!("{code}-{:02}", offset + index as u32 + 1);

    let mut questions = Vec::with_capacity(drafts.len() + 1);
    if req.scope_answer.is_some() {
        questions.push(scope_question(req.project_id, req.trade));
    }
    for (i, (draft, edge)) in drafts.into_iter().zip(edges).enumerate() {
        questions.push(Question {
            id: id_at(i),
            project_id: req.project_id,
            trade_code: code.to_string(),
            position: offset + i as u32 + 1,
            text: draft.text,
            kind: draft.kind,
            required: draft.required,
            options: draft.options,
            unit: draft.unit,
            depends_on: edge.map(id_at),
            show_if: edge.and(draft.show_if),
            origin: draft.origin,
        });
    }

    if questions.is_empty() {
        return Err(PipelineError::validation(format!(
            "no questions left for trade {code} after filtering"
        )));
    }

    info!(
        project_id = %req.project_id,
        trade = code,
        drafted,
        accepted = questions.len(),
        target = completeness.count,
        "Questions accepted"
    );
    Ok(questions)
}

/// Generate the question set for one trade.
///
/// A trade awaiting its scope description gets exactly the scoping question
/// and the oracle is not called.
pub async fn generate_questions(
    router: &OracleRouter,
    req: &QuestionRequest<'_>,
) -> PipelineResult<Vec<Question>> {
    if req.awaits_scope() {
        return Ok(vec![scope_question(req.project_id, req.trade)]);
    }
    let completeness = req.completeness();
    let drafts = draft_questions(router, req, &completeness).await?;
    accept_drafts(drafts, req, &completeness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::pipeline::facts::extract_facts;
    use serde_json::json;

    fn drafts(v: serde_json::Value) -> Vec<Draft> {
        filters::drafts_from_values(v.as_array().unwrap())
    }

    #[test]
    fn bathroom_tiling_never_reasks_area() {
        let context = ProjectContext {
            description: "Badezimmer sanieren, 8m², neue Fliesen".into(),
            ..Default::default()
        };
        let facts = extract_facts(&context.description);
        let siblings = vec!["FLI".to_string(), "SAN".to_string()];
        let req = QuestionRequest {
            project_id: Uuid::nil(),
            trade: catalog::find("FLI").unwrap(),
            provenance: Some(Provenance::Detected),
            context: &context,
            facts: &facts,
            intake_answers: &[],
            siblings: &siblings,
            scope_answer: None,
        };
        let completeness = req.completeness();
        let out = accept_drafts(
            drafts(json!([
                {"id": "1", "question": "Wie groß ist die zu fliesende Fläche in m²?", "type": "number"},
                {"id": "2", "question": "Welches Fliesenformat wünschen Sie?", "type": "select", "options": ["30x60", "60x60"]},
                {"id": "3", "question": "Soll die Dusche erneuert werden?"},
                {"id": "4", "question": "Bis zu welcher Höhe sollen die Wände gefliest werden?", "dependsOn": "2", "showIf": "60x60"}
            ])),
            &req,
            &completeness,
        )
        .unwrap();

        assert!(out.iter().all(|q| !q.text.contains("Fläche")));
        assert_eq!(out[0].id, "FLI-01");
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].depends_on.as_deref(), Some("FLI-01"));
    }

    #[test]
    fn manual_trade_awaits_scope() {
        let context = ProjectContext::default();
        let facts = ExtractedFacts::default();
        let req = QuestionRequest {
            project_id: Uuid::nil(),
            trade: catalog::find("ELEKT").unwrap(),
            provenance: Some(Provenance::Manual),
            context: &context,
            facts: &facts,
            intake_answers: &[],
            siblings: &[],
            scope_answer: None,
        };
        assert!(req.awaits_scope());
        let q = scope_question(req.project_id, req.trade);
        assert_eq!(q.id, "ELEKT-SCOPE");
        assert_eq!(q.origin, QuestionOrigin::Scope);
    }

    #[test]
    fn follow_up_round_keeps_scope_first_and_allows_no_drafts() {
        let context = ProjectContext::default();
        let facts = ExtractedFacts::default();
        let req = QuestionRequest {
            project_id: Uuid::nil(),
            trade: catalog::find("ELEKT").unwrap(),
            provenance: Some(Provenance::Manual),
            context: &context,
            facts: &facts,
            intake_answers: &[],
            siblings: &[],
            scope_answer: Some("Drei neue Steckdosen in der Küche"),
        };
        let completeness = req.completeness();
        let out = accept_drafts(Vec::new(), &req, &completeness).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "ELEKT-SCOPE");

        let out = accept_drafts(vec![Draft::new("Aufputz oder Unterputz?")], &req, &completeness)
            .unwrap();
        assert_eq!(out[1].id, "ELEKT-02");
        assert_eq!(out[1].position, 2);
    }

    #[test]
    fn empty_result_for_regular_trade_fails() {
        let context = ProjectContext::default();
        let facts = ExtractedFacts::default();
        let req = QuestionRequest {
            project_id: Uuid::nil(),
            trade: catalog::find("ELEKT").unwrap(),
            provenance: Some(Provenance::Detected),
            context: &context,
            facts: &facts,
            intake_answers: &[],
            siblings: &[],
            scope_answer: None,
        };
        let err = accept_drafts(Vec::new(), &req, &req.completeness()).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed(_)));
    }

    #[test]
    fn non_array_output_is_a_validation_failure() {
        let err = parse_drafts(TaskKind::TradeQuestions, r#"{"foo": 1}"#).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed(_)));
        let err = parse_drafts(TaskKind::TradeQuestions, "leider nein").unwrap_err();
        assert!(matches!(err, PipelineError::OracleMalformedOutput(_)));
    }
}
