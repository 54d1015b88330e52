use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Input type of a question
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Text,
    Number,
    Select,
    Multiselect,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
        }
    }

    /// Lenient parse of oracle-supplied type names.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "number" | "numeric" | "integer" | "zahl" => Self::Number,
            "select" | "single" | "radio" | "choice" | "dropdown" => Self::Select,
            "multiselect" | "multi" | "multiple" | "checkbox" => Self::Multiselect,
            _ => Self::Text,
        }
    }
}

/// Where a question came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    #[default]
    Drafted,
    Mandatory,
    Scope,
}

impl QuestionOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drafted => "drafted",
            Self::Mandatory => "mandatory",
            Self::Scope => "scope",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "drafted" => Some(Self::Drafted),
            "mandatory" => Some(Self::Mandatory),
            "scope" => Some(Self::Scope),
            _ => None,
        }
    }
}

/// A question for one (project, trade) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Unique and stable within (project, trade)
    pub id: String,
    pub project_id: Uuid,
    pub trade_code: String,
    /// 1-based display order
    pub position: u32,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<String>,
    #[serde(default)]
    pub origin: QuestionOrigin,
}

impl Question {
    /// Whether the question is shown given the answers so far.
    ///
    /// A conditional question is hidden unless the referenced question's
    /// answer matches `show_if` (case-insensitively; for multiselect answers
    /// any comma-separated entry may match).
    pub fn is_visible(&self, answers: &HashMap<String, String>) -> bool {
        let (Some(dep), Some(expected)) = (&self.depends_on, &self.show_if) else {
            return true;
        };
        let Some(given) = answers.get(dep) else {
            return false;
        };
        let expected = expected.trim().to_lowercase();
        given
            .split(',')
            .map(|part| part.trim().to_lowercase())
            .any(|part| part == expected)
    }
}

/// An answer for one (project, trade, question)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub project_id: Uuid,
    pub trade_code: String,
    pub question_id: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumption: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A single answer as submitted by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: String,
    pub answer: String,
}

/// Request DTO for saving answers (all-or-nothing)
#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnswersRequest {
    pub answers: Vec<AnswerInput>,
}

/// A prior answer as context for another phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriorAnswer {
    pub question: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditional(depends_on: &str, show_if: &str) -> Question {
        Question {
            id: "SAN-02".into(),
            project_id: Uuid::nil(),
            trade_code: "SAN".into(),
            position: 2,
            text: "Welche Duschwanne?".into(),
            kind: QuestionType::Select,
            required: false,
            options: vec![],
            unit: None,
            depends_on: Some(depends_on.into()),
            show_if: Some(show_if.into()),
            origin: QuestionOrigin::Drafted,
        }
    }

    #[test]
    fn conditional_question_visibility() {
        let q = conditional("SAN-01", "Ja");
        let mut answers = HashMap::new();
        assert!(!q.is_visible(&answers));
        answers.insert("SAN-01".to_string(), "nein".to_string());
        assert!(!q.is_visible(&answers));
        answers.insert("SAN-01".to_string(), "ja".to_string());
        assert!(q.is_visible(&answers));
    }

    #[test]
    fn multiselect_answer_matches_any_entry() {
        let q = conditional("SAN-01", "Dusche");
        let answers = HashMap::from([("SAN-01".to_string(), "WC, Dusche".to_string())]);
        assert!(q.is_visible(&answers));
    }

    #[test]
    fn lenient_type_parsing() {
        assert_eq!(QuestionType::parse_lenient("Number"), QuestionType::Number);
        assert_eq!(QuestionType::parse_lenient("checkbox"), QuestionType::Multiselect);
        assert_eq!(QuestionType::parse_lenient("whatever"), QuestionType::Text);
    }
}
