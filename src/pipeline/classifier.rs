//! Trade classification and its deterministic post-processing.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use super::prompts;
use crate::catalog::{self, rules, PV_CODE, SCAFFOLDING_CODE};
use crate::domain::{Classification, ExtractedFacts, ProjectContext, TradeCandidate};
use crate::error::{PipelineError, PipelineResult};
use crate::oracle::{repair, OracleRouter, TaskKind};

const DEFAULT_CONFIDENCE: f64 = 0.5;
const AUTO_ADDED_CONFIDENCE: f64 = 0.9;

/// A trade entry as the oracle returned it, before any validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCandidate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub confidence: Option<f64>,
    pub reason: Option<String>,
}

fn string_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
}

fn number_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    })
}

/// Read trade entries from a parsed oracle value.
///
/// Entries may be objects or bare code strings.
pub fn raw_candidates(items: &[Value]) -> Vec<RawCandidate> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(RawCandidate {
                code: Some(s.clone()),
                ..Default::default()
            }),
            Value::Object(obj) => Some(RawCandidate {
                code: string_field(obj, &["code", "tradeCode", "trade_code", "id"]),
                name: string_field(obj, &["name", "tradeName", "trade"]),
                confidence: number_field(obj, &["confidence", "score"]),
                reason: string_field(obj, &["reason", "reasoning", "begruendung"]),
            }),
            _ => None,
        })
        .collect()
}

fn clamp_confidence(c: Option<f64>) -> f64 {
    match c {
        Some(c) if c.is_finite() => {
            // Percentages are accepted too.
            let c = if c > 1.0 { c / 100.0 } else { c };
            c.clamp(0.0, 1.0)
        }
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Validate raw candidates against the catalog and apply the fixed rules.
///
/// Drops intake and unknown trades, dedupes by code, re-checks mutually
/// exclusive pairs against the project text, then adds scaffolding and
/// photovoltaics where required. Fails if no trade survives.
pub fn post_process(
    raw: Vec<RawCandidate>,
    rationale: String,
    context: &ProjectContext,
    facts: &ExtractedFacts,
) -> PipelineResult<Classification> {
    let mut seen = HashSet::new();
    let mut trades: Vec<TradeCandidate> = Vec::new();

    for candidate in raw {
        let Some(def) = catalog::lookup(candidate.code.as_deref(), candidate.name.as_deref())
        else {
            debug!(code = ?candidate.code, name = ?candidate.name, "Dropping non-catalog trade");
            continue;
        };
        if def.is_intake() || !seen.insert(def.code) {
            continue;
        }
        trades.push(TradeCandidate {
            code: def.code.to_string(),
            name: def.name.to_string(),
            confidence: clamp_confidence(candidate.confidence),
            reason: candidate.reason,
        });
    }

    if trades.is_empty() {
        return Err(PipelineError::ClassificationFailed(
            "no catalog trade matched the project".to_string(),
        ));
    }

    let text = format!("{}\n{}", context.searchable_text(), facts.measures.join("\n"));
    let mut notes = Vec::new();

    for rule in rules::EXCLUSIVITY {
        let has = |code: &str| trades.iter().any(|t| t.code == code);
        if !(has(rule.code) && has(rule.rival)) {
            continue;
        }
        let (Some(own), Some(rival)) = (rules::compiled(rule.code), rules::compiled(rule.rival))
        else {
            continue;
        };
        if rival.owned_keyword(&text).is_some() && own.owned_keyword(&text).is_none() {
            debug!(dropped = rule.code, kept = rule.rival, "Exclusive trade pair resolved");
            trades.retain(|t| t.code != rule.code);
            notes.push(format!("{} entfernt, da nur {} belegt ist.", rule.code, rule.rival));
        }
    }

    let needs_scaffolding: Vec<&str> = trades
        .iter()
        .map(|t| t.code.as_str())
        .filter(|c| rules::NEEDS_SCAFFOLDING.contains(c))
        .collect();
    if !needs_scaffolding.is_empty() && !trades.iter().any(|t| t.code == SCAFFOLDING_CODE) {
        let reason = format!("Automatisch ergänzt für {}", needs_scaffolding.join(", "));
        push_catalog_trade(&mut trades, SCAFFOLDING_CODE, reason.clone());
        notes.push(reason);
    }

    let solar = rules::mentions_solar(&text);
    if solar && !trades.iter().any(|t| t.code == PV_CODE) {
        let reason = "Automatisch ergänzt: Photovoltaik erwähnt".to_string();
        push_catalog_trade(&mut trades, PV_CODE, reason.clone());
        notes.push(reason);
    }

    let rationale = if notes.is_empty() {
        rationale
    } else {
        format!("{} {}", rationale.trim(), notes.join(" ")).trim().to_string()
    };

    Ok(Classification { trades, rationale })
}

fn push_catalog_trade(trades: &mut Vec<TradeCandidate>, code: &str, reason: String) {
    if let Some(def) = catalog::find(code) {
        trades.push(TradeCandidate {
            code: def.code.to_string(),
            name: def.name.to_string(),
            confidence: AUTO_ADDED_CONFIDENCE,
            reason: Some(reason),
        });
    }
}

fn malformed(task: TaskKind, err: repair::RepairError) -> PipelineError {
    PipelineError::OracleMalformedOutput(format!("{task}: {err}"))
}

/// Classify which trades a project needs.
#[instrument(skip_all)]
pub async fn classify_trades(
    router: &OracleRouter,
    context: &ProjectContext,
    facts: &ExtractedFacts,
) -> PipelineResult<Classification> {
    let (system, user) = prompts::trade_detection(context, facts);
    let raw = router.complete(TaskKind::TradeDetection, &system, &user).await?;

    let (items, rationale) = match repair::parse_json_object(&raw) {
        Ok(mut obj) => {
            let rationale = string_field(&obj, &["reasoning", "rationale", "begruendung"])
                .unwrap_or_default();
            let items = match obj.remove("trades") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(PipelineError::validation(
                        "trade detection output has no trades array",
                    ))
                }
            };
            (items, rationale)
        }
        // A bare array of trades is accepted as well.
        Err(_) => (
            repair::parse_json_array(&raw).map_err(|e| malformed(TaskKind::TradeDetection, e))?,
            String::new(),
        ),
    };

    let classification = post_process(raw_candidates(&items), rationale, context, facts)?;
    info!(
        trades = classification.trades.len(),
        codes = %classification.trades.iter().map(|t| t.code.as_str()).collect::<Vec<_>>().join(","),
        "Trades classified"
    );
    Ok(classification)
}

/// Suggest trades missing after the intake phase.
///
/// An oracle outage yields no suggestions rather than an error.
#[instrument(skip_all)]
pub async fn recommend_trades(
    router: &OracleRouter,
    context: &ProjectContext,
    intake_answers: &[crate::domain::PriorAnswer],
    assigned: &[String],
) -> PipelineResult<Vec<TradeCandidate>> {
    let task = TaskKind::TradeRecommendation;
    let (system, user) = prompts::trade_recommendation(context, intake_answers, assigned);
    let raw = match router.complete(task, &system, &user).await {
        Ok(raw) => raw,
        Err(PipelineError::OracleUnavailable { message, .. }) if task.tolerates_outage() => {
            tracing::warn!(error = %message, "Trade recommendation skipped, oracle unavailable");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let items = repair::parse_json_array(&raw).map_err(|e| malformed(task, e))?;
    let mut seen: HashSet<&str> = assigned.iter().map(String::as_str).collect();
    let mut out = Vec::new();
    for candidate in raw_candidates(&items) {
        let Some(def) = catalog::lookup(candidate.code.as_deref(), candidate.name.as_deref())
        else {
            continue;
        };
        if def.is_intake() || !seen.insert(def.code) {
            continue;
        }
        out.push(TradeCandidate {
            code: def.code.to_string(),
            name: def.name.to_string(),
            confidence: clamp_confidence(candidate.confidence),
            reason: candidate.reason,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::facts::extract_facts;
    use serde_json::json;

    fn ctx(description: &str) -> ProjectContext {
        ProjectContext {
            description: description.into(),
            ..Default::default()
        }
    }

    fn codes(c: &Classification) -> Vec<&str> {
        c.trades.iter().map(|t| t.code.as_str()).collect()
    }

    fn raw(items: serde_json::Value) -> Vec<RawCandidate> {
        raw_candidates(items.as_array().unwrap())
    }

    #[test]
    fn drops_intake_unknown_and_duplicates() {
        let items = raw(json!([
            {"code": "INT", "name": "Projektaufnahme", "confidence": 1.0},
            {"code": "SAN", "confidence": 0.9},
            {"code": "XYZ", "name": "Schwimmbadbau"},
            {"name": "sanitärinstallation", "confidence": 0.4},
            {"code": "elekt", "confidence": 85}
        ]));
        let c = post_process(items, "ok".into(), &ctx("Bad"), &ExtractedFacts::default()).unwrap();
        assert_eq!(codes(&c), vec!["SAN", "ELEKT"]);
        assert_eq!(c.trades[1].confidence, 0.85);
    }

    #[test]
    fn empty_result_is_a_failure() {
        let items = raw(json!([{"code": "INT"}, {"code": "NOPE"}]));
        let err = post_process(items, String::new(), &ctx("x"), &ExtractedFacts::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ClassificationFailed(_)));
    }

    #[test]
    fn bathroom_tiles_excludes_flooring() {
        let context = ctx("Badezimmer sanieren, 8m², neue Fliesen");
        let facts = extract_facts(&context.description);
        let items = raw(json!([{"code": "FLI"}, {"code": "BOD"}, {"code": "SAN"}]));
        let c = post_process(items, String::new(), &context, &facts).unwrap();
        assert!(codes(&c).contains(&"FLI"));
        assert!(!codes(&c).contains(&"BOD"));
    }

    #[test]
    fn flooring_stays_when_parquet_is_mentioned() {
        let context = ctx("Fliesen im Bad und Parkett im Wohnzimmer");
        let items = raw(json!([{"code": "FLI"}, {"code": "BOD"}]));
        let c = post_process(items, String::new(), &context, &ExtractedFacts::default()).unwrap();
        assert_eq!(codes(&c), vec!["FLI", "BOD"]);
    }

    #[test]
    fn scaffolding_added_exactly_once() {
        let items = raw(json!([{"code": "DACH"}, {"code": "FASS"}, {"code": "FEN"}]));
        let c = post_process(items, String::new(), &ctx("Dach und Fassade"), &ExtractedFacts::default())
            .unwrap();
        assert_eq!(codes(&c).iter().filter(|c| **c == "GER").count(), 1);

        let items = raw(json!([{"code": "DACH"}, {"code": "GER"}]));
        let c = post_process(items, String::new(), &ctx("Dach"), &ExtractedFacts::default()).unwrap();
        assert_eq!(codes(&c), vec!["DACH", "GER"]);
    }

    #[test]
    fn solar_keyword_adds_pv() {
        let items = raw(json!([{"code": "ELEKT"}]));
        let c = post_process(
            items,
            String::new(),
            &ctx("Neue Photovoltaik-Anlage aufs Dach"),
            &ExtractedFacts::default(),
        )
        .unwrap();
        assert_eq!(codes(&c), vec!["ELEKT", "PV"]);
    }

    #[test]
    fn bare_code_strings_are_accepted() {
        let items = raw(json!(["MAL", 42, "TRO"]));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].code.as_deref(), Some("MAL"));
    }
}
