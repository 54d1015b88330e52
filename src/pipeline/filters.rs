//! Deterministic passes over drafted questions.
//!
//! Every pass takes the current drafts and returns the survivors, logging
//! each drop with its reason. None of them depends on what the oracle was
//! told, so they hold whatever it returns.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::facts::KnownFacts;
use super::text;
use crate::catalog::rules::{self, CompiledRules};
use crate::domain::{QuestionOrigin, QuestionType};

/// A question as drafted, before it gets its final id.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Identifier the oracle used, only meaningful for dependency edges.
    pub ref_id: Option<String>,
    pub text: String,
    pub kind: QuestionType,
    pub required: bool,
    pub options: Vec<String>,
    pub unit: Option<String>,
    pub depends_on: Option<String>,
    pub show_if: Option<String>,
    pub origin: QuestionOrigin,
}

impl Draft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            ref_id: None,
            text: text.into(),
            kind: QuestionType::Text,
            required: true,
            options: Vec::new(),
            unit: None,
            depends_on: None,
            show_if: None,
            origin: QuestionOrigin::Drafted,
        }
    }
}

fn str_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn options_of(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(o) => field(o, &["label", "value", "text"]).and_then(str_of),
            other => str_of(other),
        })
        .collect()
}

/// Read drafts from parsed oracle output. Entries without text are skipped.
pub fn drafts_from_values(items: &[Value]) -> Vec<Draft> {
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let text = field(obj, &["question", "text", "frage"]).and_then(str_of)?;
            let kind = field(obj, &["type", "kind"])
                .and_then(Value::as_str)
                .map(QuestionType::parse_lenient)
                .unwrap_or_default();
            let options = options_of(field(obj, &["options", "optionen"]));
            // A choice without options cannot be answered.
            let kind = match kind {
                QuestionType::Select | QuestionType::Multiselect if options.is_empty() => {
                    QuestionType::Text
                }
                k => k,
            };
            Some(Draft {
                ref_id: field(obj, &["id"]).and_then(str_of),
                text,
                kind,
                required: field(obj, &["required"])
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                options,
                unit: field(obj, &["unit", "einheit"]).and_then(str_of),
                depends_on: field(obj, &["dependsOn", "depends_on"]).and_then(str_of),
                show_if: field(obj, &["showIf", "show_if"]).and_then(str_of),
                origin: QuestionOrigin::Drafted,
            })
        })
        .collect()
}

/// Drop drafts whose normalized text was already seen.
pub fn dedupe_exact(drafts: Vec<Draft>) -> Vec<Draft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|d| {
            let keep = seen.insert(text::normalize(&d.text));
            if !keep {
                debug!(question = %d.text, reason = "duplicate", "Dropping question");
            }
            keep
        })
        .collect()
}

/// Drop drafts that re-ask known facts or repeat an answered question.
pub fn drop_known(drafts: Vec<Draft>, known: &KnownFacts) -> Vec<Draft> {
    drafts
        .into_iter()
        .filter(|d| {
            if let Some(topic) = known.covered_topic(&d.text) {
                debug!(question = %d.text, reason = "known_fact", topic, "Dropping question");
                return false;
            }
            if let Some(prior) = known.near_duplicate(&d.text) {
                debug!(question = %d.text, reason = "already_answered", prior, "Dropping question");
                return false;
            }
            true
        })
        .collect()
}

/// Drop drafts touching a sibling trade's responsibility or a topic the trade
/// must never ask about.
pub fn drop_cross_trade(drafts: Vec<Draft>, trade: &str, siblings: &[String]) -> Vec<Draft> {
    let own: Option<&CompiledRules> = rules::compiled(trade);
    drafts
        .into_iter()
        .filter(|d| {
            if let Some(topic) = own.and_then(|r| r.forbidden_topic(&d.text)) {
                debug!(question = %d.text, reason = "never_ask", topic, "Dropping question");
                return false;
            }
            if let Some((owner, keyword)) =
                rules::sibling_owner(trade, siblings.iter().map(String::as_str), &d.text)
            {
                debug!(question = %d.text, reason = "sibling_trade", owner, keyword, "Dropping question");
                return false;
            }
            true
        })
        .collect()
}

static EXCLUSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:kein|keine|keinen|keiner|keinem|ohne)\s+(?:neue[nmrs]?\s+)?([\wäöüß-]{3,})")
        .expect("valid regex")
});

/// Words after "kein"/"ohne" that name no building element.
const NOT_AN_ELEMENT: &[&str] = &[
    "ahnung", "angabe", "angaben", "idee", "problem", "probleme", "weitere", "weiteren",
    "weiteres", "änderung", "änderungen", "präferenz", "vorgabe", "vorgaben", "wunsch",
    "wünsche", "budget", "zeitdruck", "eile",
];

fn stem(word: &str) -> String {
    let word = word.to_lowercase();
    for suffix in ["en", "e", "n", "s"] {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.chars().count() >= 3 {
                return stem.to_string();
            }
        }
    }
    word
}

/// Elements the project explicitly excludes ("keine Haustür", "ohne Keller").
pub fn excluded_elements<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for text in texts {
        for cap in EXCLUSION.captures_iter(text) {
            let word = cap[1].to_lowercase();
            if NOT_AN_ELEMENT.contains(&word.as_str()) {
                continue;
            }
            let stem = stem(&word);
            if !out.contains(&stem) {
                out.push(stem);
            }
        }
    }
    out
}

/// Drop drafts that ask about an excluded element.
pub fn drop_excluded(drafts: Vec<Draft>, excluded: &[String]) -> Vec<Draft> {
    if excluded.is_empty() {
        return drafts;
    }
    let patterns: Vec<(String, Regex)> = excluded
        .iter()
        .filter_map(|e| rules::keyword_regex(e).ok().map(|re| (e.clone(), re)))
        .collect();
    drafts
        .into_iter()
        .filter(|d| {
            if let Some((element, _)) = patterns.iter().find(|(_, re)| re.is_match(&d.text)) {
                debug!(question = %d.text, reason = "excluded_by_project", element = %element, "Dropping question");
                return false;
            }
            true
        })
        .collect()
}

/// Insert the trade's mandatory questions that the drafts lack.
pub fn inject_mandatory(mut drafts: Vec<Draft>, trade: &str, known: &KnownFacts) -> Vec<Draft> {
    let Some(compiled) = rules::compiled(trade) else {
        return drafts;
    };
    let mut mandatory: Vec<_> = compiled.mandatory.iter().collect();
    mandatory.sort_by_key(|(m, _)| m.position);

    for (m, covered) in mandatory {
        if m.skip_when_known.is_some_and(|topic| known.knows(topic)) {
            continue;
        }
        if drafts.iter().any(|d| covered.is_match(&d.text)) {
            continue;
        }
        let at = m.position.min(drafts.len());
        debug!(trade, key = m.key, position = at, "Injecting mandatory question");
        drafts.insert(
            at,
            Draft {
                ref_id: None,
                text: m.text.to_string(),
                kind: m.kind,
                required: true,
                options: m.options.iter().map(|o| o.to_string()).collect(),
                unit: m.unit.map(str::to_string),
                depends_on: None,
                show_if: None,
                origin: QuestionOrigin::Mandatory,
            },
        );
    }
    drafts
}

/// Keep only single-level edges pointing at an earlier, unconditional draft.
///
/// Returns, per draft, the index of the draft it depends on.
pub fn resolve_dependencies(drafts: &mut [Draft]) -> Vec<Option<usize>> {
    let index_of: HashMap<String, usize> = drafts
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.ref_id.clone().map(|r| (r, i)))
        .collect();

    let raw: Vec<Option<usize>> = drafts
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let target = d.depends_on.as_ref().and_then(|dep| index_of.get(dep)).copied()?;
            (target < i && d.show_if.is_some()).then_some(target)
        })
        .collect();

    let edges: Vec<Option<usize>> = raw
        .iter()
        .map(|edge| edge.filter(|&t| raw[t].is_none()))
        .collect();

    for (draft, edge) in drafts.iter_mut().zip(&edges) {
        if edge.is_none() && draft.depends_on.is_some() {
            debug!(question = %draft.text, "Clearing unresolvable dependency");
            draft.depends_on = None;
            draft.show_if = None;
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtractedFacts, ProjectContext};
    use crate::pipeline::facts::extract_facts;
    use serde_json::json;

    fn texts(drafts: &[Draft]) -> Vec<&str> {
        drafts.iter().map(|d| d.text.as_str()).collect()
    }

    fn known_for(description: &str) -> KnownFacts {
        KnownFacts::new(
            &ProjectContext::default(),
            &extract_facts(description),
            &[],
        )
    }

    #[test]
    fn reads_lenient_draft_shapes() {
        let items = json!([
            {"id": "q1", "question": "Welche Fliesen?", "type": "select", "options": [{"label": "Feinsteinzeug"}, "Naturstein"]},
            {"text": "Wie viele Duschen?", "type": "number", "required": false},
            {"id": 3, "frage": "Fugenfarbe?", "type": "select"},
            {"id": "leer"}
        ]);
        let drafts = drafts_from_values(items.as_array().unwrap());
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].options, vec!["Feinsteinzeug", "Naturstein"]);
        assert_eq!(drafts[1].kind, QuestionType::Number);
        assert!(!drafts[1].required);
        assert_eq!(drafts[2].ref_id.as_deref(), Some("3"));
        assert_eq!(drafts[2].kind, QuestionType::Text);
    }

    #[test]
    fn exact_duplicates_are_removed() {
        let drafts = vec![Draft::new("Welche Farbe?"), Draft::new("welche farbe"), Draft::new("Welcher Glanzgrad?")];
        assert_eq!(texts(&dedupe_exact(drafts)), vec!["Welche Farbe?", "Welcher Glanzgrad?"]);
    }

    #[test]
    fn known_area_is_not_asked_again() {
        let known = known_for("Badezimmer sanieren, 8m², neue Fliesen");
        let drafts = vec![
            Draft::new("Wie groß ist die zu fliesende Fläche in m²?"),
            Draft::new("Welches Fliesenformat wünschen Sie?"),
        ];
        assert_eq!(texts(&drop_known(drafts, &known)), vec!["Welches Fliesenformat wünschen Sie?"]);
    }

    #[test]
    fn cross_trade_questions_are_removed() {
        let siblings = vec!["FLI".to_string(), "SAN".to_string(), "TIS".to_string()];
        let drafts = vec![
            Draft::new("Sollen die Fliesen bis zur Decke reichen?"),
            Draft::new("Wird ein Gerüst benötigt?"),
            Draft::new("Wie viele Fenster sind betroffen?"),
            Draft::new("Soll eine neue Haustür eingebaut werden?"),
        ];
        let kept = drop_cross_trade(drafts, "FEN", &siblings);
        assert_eq!(texts(&kept), vec!["Wie viele Fenster sind betroffen?"]);
    }

    #[test]
    fn excluded_elements_are_extracted_and_dropped() {
        let excluded = excluded_elements(["Neue Fenster, keine Haustür, ohne Rollläden. Keine Ahnung vom Rest."]);
        assert_eq!(excluded, vec!["haustür", "rollläd"]);
        let drafts = vec![
            Draft::new("Welche Haustür wünschen Sie?"),
            Draft::new("Sollen Rollläden elektrisch sein?"),
            Draft::new("Welche Verglasung?"),
        ];
        assert_eq!(texts(&drop_excluded(drafts, &excluded)), vec!["Welche Verglasung?"]);
    }

    #[test]
    fn mandatory_questions_are_inserted_near_the_top() {
        let known = KnownFacts::new(&ProjectContext::default(), &ExtractedFacts::default(), &[]);
        let drafts = vec![Draft::new("Welche Verglasung?"), Draft::new("Sollen Rollläden mit?")];
        let out = inject_mandatory(drafts, "FEN", &known);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].text, "Wie viele Fenster sollen erneuert werden?");
        assert_eq!(out[1].origin, QuestionOrigin::Mandatory);
        assert!(out[2].text.contains("für jedes Fenster einzeln"));
        assert_eq!(out[3].text, "Welche Verglasung?");
    }

    #[test]
    fn mandatory_area_skipped_when_known_or_covered() {
        let known = known_for("Bad, 8 m²");
        assert_eq!(inject_mandatory(vec![Draft::new("Format?")], "FLI", &known).len(), 1);

        let unknown = known_for("Bad");
        let covered = vec![Draft::new("Welche Fläche in m² soll gefliest werden?")];
        assert_eq!(inject_mandatory(covered, "FLI", &unknown).len(), 1);
    }

    #[test]
    fn dependencies_are_single_level_and_backward() {
        let mut d = vec![
            Draft { ref_id: Some("a".into()), ..Draft::new("Dusche gewünscht?") },
            Draft { ref_id: Some("b".into()), depends_on: Some("a".into()), show_if: Some("Ja".into()), ..Draft::new("Bodengleich?") },
            Draft { ref_id: Some("c".into()), depends_on: Some("b".into()), show_if: Some("Ja".into()), ..Draft::new("Rinne oder Punktablauf?") },
            Draft { ref_id: Some("d".into()), depends_on: Some("e".into()), show_if: Some("Ja".into()), ..Draft::new("Glaswand?") },
            Draft { ref_id: Some("e".into()), ..Draft::new("Wanne?") },
        ];
        let edges = resolve_dependencies(&mut d);
        assert_eq!(edges, vec![None, Some(0), None, None, None]);
        assert!(d[2].depends_on.is_none());
        assert!(d[3].depends_on.is_none());
        assert_eq!(d[1].show_if.as_deref(), Some("Ja"));
    }
}
