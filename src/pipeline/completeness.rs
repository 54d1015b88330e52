//! Information-completeness scoring and question-count sizing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::facts::{answer_fact_text, KnownFacts};
use crate::catalog::{self, rules, ComplexityTier, QuestionRange, TradeDef};
use crate::catalog::rules::KnownTopic;
use crate::domain::{ExtractedFacts, PriorAnswer, ProjectContext};
use crate::error::{PipelineError, PipelineResult};

const PER_ANSWER: u32 = 2;
const ANSWER_CAP: u32 = 20;
const PER_NUMERIC_ANSWER: u32 = 3;
const NUMERIC_CAP: u32 = 15;
const BUDGET_BONUS: u32 = 5;
const RENOVATION_BONUS: u32 = 5;
/// Extra questions per missing critical fact.
const MISSING_PENALTY: u32 = 1;

static RENOVATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sanier|renovier|modernisier").expect("valid regex"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessResult {
    pub trade_code: String,
    /// Target number of questions, within `range`
    pub count: u32,
    /// 0–100
    pub completeness: u32,
    pub missing_critical_info: Vec<String>,
    pub range: QuestionRange,
    /// Set when a fixed count replaced the formula
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
}

fn description_score(len: usize) -> u32 {
    match len {
        300.. => 25,
        150.. => 18,
        60.. => 10,
        20.. => 5,
        _ => 0,
    }
}

/// Map completeness onto a count in `range` for the trade's tier.
fn target_count(tier: ComplexityTier, range: QuestionRange, completeness: u32) -> u32 {
    let span = f64::from(range.max - range.min);
    let c = f64::from(completeness.min(100)) / 100.0;
    let shrink = match tier {
        ComplexityTier::Simple => (c * 1.2).min(1.0),
        ComplexityTier::Moderate => c,
        ComplexityTier::Complex if c <= 0.6 => 0.0,
        ComplexityTier::Complex => (c - 0.6) / 0.4 * 0.7,
    };
    range.max - (span * shrink).round() as u32
}

/// Score how much is known for `trade_code` and size its question set.
pub fn score_completeness(
    trade_code: &str,
    context: &ProjectContext,
    facts: &ExtractedFacts,
    prior_answers: &[PriorAnswer],
) -> PipelineResult<CompletenessResult> {
    let trade = catalog::find(trade_code)
        .ok_or_else(|| PipelineError::not_found(format!("trade {trade_code}")))?;
    Ok(score(trade, context, facts, prior_answers))
}

pub(crate) fn score(
    trade: &TradeDef,
    context: &ProjectContext,
    facts: &ExtractedFacts,
    prior_answers: &[PriorAnswer],
) -> CompletenessResult {
    let range = trade.question_range();
    let known = KnownFacts::new(context, facts, prior_answers);

    let mut text = context.searchable_text();
    if let Some(area) = facts.floor_area_m2 {
        text.push_str(&format!("\n{area} m²"));
    }
    for answer in prior_answers {
        text.push('\n');
        text.push_str(&answer_fact_text(answer));
    }

    let mut completeness = description_score(context.description.trim().chars().count());
    let mut missing = Vec::new();

    if let Some(compiled) = rules::compiled(trade.code) {
        for (fact, re) in &compiled.critical {
            if re.is_match(&text) {
                completeness += fact.weight;
            } else {
                missing.push(fact.label.to_string());
            }
        }
    }

    let answered: Vec<&PriorAnswer> = prior_answers
        .iter()
        .filter(|a| !a.answer.trim().is_empty())
        .collect();
    completeness += (answered.len() as u32 * PER_ANSWER).min(ANSWER_CAP);
    let numeric = answered
        .iter()
        .filter(|a| DIGIT.is_match(&a.answer))
        .count() as u32;
    completeness += (numeric * PER_NUMERIC_ANSWER).min(NUMERIC_CAP);

    if context.budget.as_deref().is_some_and(|b| !b.trim().is_empty()) {
        completeness += BUDGET_BONUS;
    }
    let category_text = format!(
        "{} {} {}",
        context.category.as_deref().unwrap_or_default(),
        context.sub_category.as_deref().unwrap_or_default(),
        context.description
    );
    if RENOVATION.is_match(&category_text) {
        completeness += RENOVATION_BONUS;
    }
    let completeness = completeness.min(100);

    let formula = target_count(trade.complexity.tier(), range, completeness);
    let mut count = range.clamp(formula + missing.len() as u32 * MISSING_PENALTY);

    let override_reason =
        rules::count_override(trade.code, &text, known.knows(KnownTopic::Area)).map(|o| {
            count = range.clamp(o.count);
            o.reason.to_string()
        });

    tracing::debug!(
        trade = trade.code,
        completeness,
        count,
        missing = missing.len(),
        overridden = override_reason.is_some(),
        "Completeness scored"
    );

    CompletenessResult {
        trade_code: trade.code.to_string(),
        count,
        completeness,
        missing_critical_info: missing,
        range,
        override_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::facts::extract_facts;

    fn context(description: &str) -> ProjectContext {
        ProjectContext {
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn bathroom_tiling_is_over_half_complete() {
        let ctx = context("Badezimmer sanieren, 8m², neue Fliesen");
        let facts = extract_facts(&ctx.description);
        let result = score_completeness("FLI", &ctx, &facts, &[]).unwrap();
        assert!(result.completeness > 50, "{}", result.completeness);
        assert!(!result.missing_critical_info.contains(&"Fläche in m²".to_string()));
    }

    #[test]
    fn more_matched_facts_never_lower_completeness() {
        let base = context("Dach neu decken");
        let richer = context("Dach neu decken, Satteldach, 120 m², Ziegel, mit Dämmung");
        let a = score_completeness("DACH", &base, &ExtractedFacts::default(), &[]).unwrap();
        let b = score_completeness("DACH", &richer, &ExtractedFacts::default(), &[]).unwrap();
        assert!(b.completeness >= a.completeness);
        assert!(b.missing_critical_info.len() < a.missing_critical_info.len());
    }

    #[test]
    fn count_always_within_range() {
        let descriptions = [
            "",
            "Wohnzimmer streichen, 20 m²",
            "Komplettsanierung Einfamilienhaus mit neuer Heizung, Wärmepumpe, 140 m², Fußbodenheizung, Budget 80.000 €, Altbau von 1965, alle Räume betroffen, inklusive neuer Elektrik und Bäder, dazu Fassadendämmung mit WDVS und neue Fenster aus Kunststoff.",
        ];
        for trade in catalog::CATALOG {
            for d in descriptions {
                let r = score_completeness(trade.code, &context(d), &extract_facts(d), &[]).unwrap();
                let range = trade.question_range();
                assert!(r.count >= range.min && r.count <= range.max, "{} {}", trade.code, r.count);
                assert!(r.completeness <= 100);
            }
        }
    }

    #[test]
    fn single_room_repaint_is_overridden() {
        let ctx = context("Wohnzimmer streichen, 20 m²");
        let r = score_completeness("MAL", &ctx, &extract_facts(&ctx.description), &[]).unwrap();
        assert_eq!(r.count, 5);
        assert!(r.override_reason.is_some());
    }

    #[test]
    fn complex_trades_stay_at_max_until_well_known() {
        let range = QuestionRange { min: 20, max: 35 };
        assert_eq!(target_count(ComplexityTier::Complex, range, 40), 35);
        assert_eq!(target_count(ComplexityTier::Complex, range, 60), 35);
        assert!(target_count(ComplexityTier::Complex, range, 100) < 35);
        let simple = QuestionRange { min: 5, max: 12 };
        assert_eq!(target_count(ComplexityTier::Simple, simple, 90), 5);
    }

    #[test]
    fn answers_add_capped_increments() {
        let ctx = context("Fenster");
        let answers: Vec<PriorAnswer> = (0..30)
            .map(|i| PriorAnswer {
                question: format!("Frage {i}"),
                answer: format!("{i}"),
            })
            .collect();
        let without = score_completeness("FEN", &ctx, &ExtractedFacts::default(), &[]).unwrap();
        let with = score_completeness("FEN", &ctx, &ExtractedFacts::default(), &answers).unwrap();
        assert!(with.completeness - without.completeness <= ANSWER_CAP + NUMERIC_CAP);
    }

    #[test]
    fn unknown_trade_is_not_found() {
        let err = score_completeness("XYZ", &context("x"), &ExtractedFacts::default(), &[]).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
