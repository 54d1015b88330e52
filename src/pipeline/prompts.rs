//! Generation instructions sent to the drafting oracle.
//!
//! Each builder returns `(system, user)`. The deterministic passes after the
//! oracle call enforce everything stated here, so the wording only steers the
//! draft.

use std::fmt::Write as _;

use super::completeness::CompletenessResult;
use super::facts::KnownFacts;
use crate::catalog::{self, rules, TradeDef};
use crate::domain::{ExtractedFacts, PriorAnswer, ProjectContext};

const QUESTION_FORMAT: &str = r#"Antworte ausschließlich mit einem JSON-Array. Jedes Element:
{"id": "q1", "question": "...", "type": "text|number|select|multiselect", "required": true,
 "options": ["..."], "unit": "m²", "dependsOn": "q0", "showIf": "Ja"}
"dependsOn" und "showIf" nur für Folgefragen, die von der Antwort einer früheren Frage abhängen."#;

fn project_block(context: &ProjectContext) -> String {
    let mut out = format!("PROJEKTBESCHREIBUNG:\n{}\n", context.description.trim());
    let fields = [
        ("Kategorie", &context.category),
        ("Unterkategorie", &context.sub_category),
        ("Zeitrahmen", &context.timeframe),
        ("Budget", &context.budget),
    ];
    for (label, value) in fields {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            let _ = writeln!(out, "{label}: {v}");
        }
    }
    out
}

fn answers_block(title: &str, answers: &[PriorAnswer]) -> String {
    if answers.is_empty() {
        return String::new();
    }
    let mut out = format!("{title}:\n");
    for a in answers {
        let _ = writeln!(out, "- {} → {}", a.question.trim(), a.answer.trim());
    }
    out
}

fn catalog_listing() -> String {
    catalog::classifiable()
        .map(|t| format!("- {}: {}", t.code, t.name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn trade_detection(context: &ProjectContext, facts: &ExtractedFacts) -> (String, String) {
    let system = format!(
        "Du bist ein erfahrener Bauleiter. Ordne Bauprojekte den benötigten Gewerken zu.\n\
         Verwende ausschließlich diese Gewerke:\n{}\n\
         Antworte mit einem JSON-Objekt: {{\"trades\": [{{\"code\": \"...\", \"name\": \"...\", \
         \"confidence\": 0.0, \"reason\": \"...\"}}], \"reasoning\": \"...\"}}",
        catalog_listing()
    );
    let mut user = project_block(context);
    if !facts.is_empty() {
        let facts_json = serde_json::to_string(facts).unwrap_or_default();
        let _ = writeln!(user, "\nERKANNTE FAKTEN: {facts_json}");
    }
    user.push_str("\nWelche Gewerke werden benötigt?");
    (system, user)
}

pub fn intake_questions(
    context: &ProjectContext,
    known: &KnownFacts,
    count: u32,
) -> (String, String) {
    let system = format!(
        "Du bist ein Bauberater und führst das Erstgespräch mit einem Bauherrn. \
         Stelle allgemeine, gewerkübergreifende Fragen (Zugang, Nutzung, Zustand, Rahmenbedingungen). \
         Keine gewerkspezifischen Detailfragen.\n{QUESTION_FORMAT}"
    );
    let mut user = project_block(context);
    user.push('\n');
    user.push_str(&known.prompt_block());
    let _ = write!(user, "\nErstelle genau {count} Fragen.");
    (system, user)
}

pub struct TradeQuestionPrompt<'a> {
    pub trade: &'a TradeDef,
    pub context: &'a ProjectContext,
    pub known: &'a KnownFacts,
    pub intake_answers: &'a [PriorAnswer],
    pub siblings: &'a [String],
    pub completeness: &'a CompletenessResult,
}

fn boundary_block(trade: &TradeDef, siblings: &[String]) -> String {
    let mut out = String::new();
    if let Some(compiled) = rules::compiled(trade.code) {
        for note in compiled.rules.prompt_notes {
            let _ = writeln!(out, "- {note}");
        }
    }
    for code in siblings.iter().filter(|c| c.as_str() != trade.code) {
        let Some(def) = catalog::find(code) else {
            continue;
        };
        match rules::compiled(code) {
            Some(r) if !r.rules.owns.is_empty() => {
                let _ = writeln!(
                    out,
                    "- Keine Fragen zu {}. Das gehört zum Gewerk {}.",
                    r.rules.owns.join(", "),
                    def.name
                );
            }
            _ => {}
        }
    }
    if out.is_empty() {
        return out;
    }
    format!("GEWERKSGRENZEN:\n{out}")
}

pub fn trade_questions(p: &TradeQuestionPrompt<'_>) -> (String, String) {
    let system = format!(
        "Du bist Experte für das Gewerk {} und bereitest ein Leistungsverzeichnis vor. \
         Frage nur, was für eine belastbare Mengen- und Preisermittlung fehlt. \
         Laienverständliche Sprache.\n{QUESTION_FORMAT}",
        p.trade.name
    );

    let mut user = project_block(p.context);
    user.push('\n');
    user.push_str(&p.known.prompt_block());
    user.push_str(&answers_block("ANTWORTEN AUS DEM ERSTGESPRÄCH", p.intake_answers));
    user.push_str(&boundary_block(p.trade, p.siblings));
    let _ = writeln!(
        user,
        "\nInformationsstand: {}%. Fehlende Kerninformationen: {}.",
        p.completeness.completeness,
        if p.completeness.missing_critical_info.is_empty() {
            "keine".to_string()
        } else {
            p.completeness.missing_critical_info.join(", ")
        }
    );
    let _ = write!(
        user,
        "Erstelle genau {} Fragen für das Gewerk {} ({}). Bei hohem Informationsstand dürfen es weniger sein.",
        p.completeness.count, p.trade.name, p.trade.code
    );
    (system, user)
}

pub fn follow_up_questions(
    trade: &TradeDef,
    context: &ProjectContext,
    scope_answer: &str,
    known: &KnownFacts,
    count: u32,
) -> (String, String) {
    let system = format!(
        "Du bist Experte für das Gewerk {}. Der Bauherr hat beschrieben, was gemacht werden soll. \
         Stelle gezielte Nachfragen zu genau diesem Umfang.\n{QUESTION_FORMAT}",
        trade.name
    );
    let mut user = project_block(context);
    let _ = writeln!(user, "\nGEWÜNSCHTER UMFANG ({}): {}", trade.name, scope_answer.trim());
    user.push_str(&known.prompt_block());
    let _ = write!(user, "\nErstelle höchstens {count} Nachfragen.");
    (system, user)
}

pub fn trade_recommendation(
    context: &ProjectContext,
    intake_answers: &[PriorAnswer],
    assigned: &[String],
) -> (String, String) {
    let system = format!(
        "Du bist ein erfahrener Bauleiter. Prüfe, ob nach dem Erstgespräch weitere Gewerke nötig sind.\n\
         Verfügbare Gewerke:\n{}\n\
         Antworte mit einem JSON-Objekt: {{\"trades\": [{{\"code\": \"...\", \"name\": \"...\", \
         \"confidence\": 0.0, \"reason\": \"...\"}}]}}. Leere Liste, wenn nichts fehlt.",
        catalog_listing()
    );
    let mut user = project_block(context);
    user.push('\n');
    user.push_str(&answers_block("ANTWORTEN AUS DEM ERSTGESPRÄCH", intake_answers));
    let _ = write!(user, "\nBereits zugeordnet: {}", assigned.join(", "));
    (system, user)
}

/// One answered question with its assumption note, as LV input.
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
    pub assumption: Option<String>,
}

pub fn lv_generation(
    trade: &TradeDef,
    context: &ProjectContext,
    intake_answers: &[PriorAnswer],
    answered: &[AnsweredQuestion],
) -> (String, String) {
    let system = format!(
        "Du bist Kalkulator für das Gewerk {}. Erstelle ein Leistungsverzeichnis mit \
         realistischen Mengen und marktüblichen Einheitspreisen (netto, EUR).\n\
         Antworte mit einem JSON-Objekt: {{\"positions\": [{{\"title\": \"...\", \
         \"description\": \"...\", \"quantity\": 0, \"unit\": \"m²\", \"unitPrice\": 0, \
         \"isNEP\": false, \"dataSource\": \"measured|estimated|assumed\"}}]}}.\n\
         Optionale Leistungen als NEP-Position (isNEP: true).",
        trade.name
    );
    let mut user = project_block(context);
    user.push('\n');
    user.push_str(&answers_block("ANTWORTEN AUS DEM ERSTGESPRÄCH", intake_answers));
    let _ = writeln!(user, "ANTWORTEN ZUM GEWERK {}:", trade.name);
    for a in answered {
        let _ = write!(user, "- {} → {}", a.question.trim(), a.answer.trim());
        if let Some(note) = &a.assumption {
            let _ = write!(user, " (Annahme: {note})");
        }
        user.push('\n');
    }
    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_prompt_lists_catalog_but_not_intake() {
        let ctx = ProjectContext {
            description: "Dach neu decken".into(),
            budget: Some("20.000 €".into()),
            ..Default::default()
        };
        let (system, user) = trade_detection(&ctx, &ExtractedFacts::default());
        assert!(system.contains("- DACH: Dachdeckerarbeiten"));
        assert!(!system.contains("- INT:"));
        assert!(user.contains("Budget: 20.000 €"));
    }

    #[test]
    fn trade_prompt_carries_boundaries_and_count() {
        let ctx = ProjectContext {
            description: "Bad sanieren".into(),
            ..Default::default()
        };
        let known = KnownFacts::default();
        let completeness = CompletenessResult {
            trade_code: "SAN".into(),
            count: 17,
            completeness: 40,
            missing_critical_info: vec![],
            range: catalog::find("SAN").unwrap().question_range(),
            override_reason: None,
        };
        let siblings = vec!["SAN".to_string(), "FLI".to_string()];
        let (_, user) = trade_questions(&TradeQuestionPrompt {
            trade: catalog::find("SAN").unwrap(),
            context: &ctx,
            known: &known,
            intake_answers: &[],
            siblings: &siblings,
            completeness: &completeness,
        });
        assert!(user.contains("genau 17 Fragen"));
        assert!(user.contains("fliese"));
        assert!(user.contains("Fliesenarbeiten gehören zum Fliesenleger"));
    }
}
