//! Turns uncertain answers into an explicit default plus a visible note.

use serde::Serialize;

/// Answer substituted for an uncertain one.
pub const PLACEHOLDER_ANSWER: &str = "Standardausführung (keine genaue Angabe)";

/// Note attached whenever [`PLACEHOLDER_ANSWER`] was substituted.
pub const ASSUMPTION_NOTE: &str =
    "Der Bauherr war unsicher; es wurde eine marktübliche Standardausführung angenommen.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub final_answer: String,
    pub assumption: Option<String>,
}

fn is_uncertain(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    let token = lowered.trim_end_matches(['.', '!', '?']);
    token == "unsicher" || lowered.contains("weiß nicht") || lowered.contains("weiss nicht")
}

/// Resolve a raw answer.
///
/// Numeric estimation from other answers is not attempted.
pub fn resolve_answer(raw: &str) -> Resolution {
    if is_uncertain(raw) {
        return Resolution {
            final_answer: PLACEHOLDER_ANSWER.to_string(),
            assumption: Some(ASSUMPTION_NOTE.to_string()),
        };
    }
    Resolution {
        final_answer: raw.to_string(),
        assumption: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncertainty_signals_are_replaced() {
        for raw in ["weiß nicht", "Weiß nicht genau", "UNSICHER", " unsicher. ", "ich weiss nicht"] {
            let r = resolve_answer(raw);
            assert_eq!(r.final_answer, PLACEHOLDER_ANSWER, "{raw}");
            assert_eq!(r.assumption.as_deref(), Some(ASSUMPTION_NOTE));
        }
    }

    #[test]
    fn other_answers_pass_through() {
        for raw in ["8", "Feinsteinzeug 60x60", "eher unsicher bei der Farbe", ""] {
            let r = resolve_answer(raw);
            assert_eq!(r.final_answer, raw);
            assert!(r.assumption.is_none());
        }
    }
}
