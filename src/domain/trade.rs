use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a trade came to be assigned to a project. Immutable once set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Found by the trade classifier
    Detected,
    /// Added by the user
    Manual,
    /// Suggested during the intake summary
    AiRecommended,
    /// Added after the initial confirmation
    Additional,
}

impl Provenance {
    /// Manually added and AI-recommended trades start with a single scoping question.
    pub fn requires_scope_question(self) -> bool {
        matches!(self, Self::Manual | Self::AiRecommended)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Manual => "manual",
            Self::AiRecommended => "ai_recommended",
            Self::Additional => "additional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "detected" => Some(Self::Detected),
            "manual" => Some(Self::Manual),
            "ai_recommended" => Some(Self::AiRecommended),
            "additional" => Some(Self::Additional),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified trade candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradeCandidate {
    pub code: String,
    pub name: String,
    /// In [0, 1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Classifier output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub trades: Vec<TradeCandidate>,
    pub rationale: String,
}

/// Project ↔ trade association
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAssignment {
    pub project_id: Uuid,
    pub trade_code: String,
    pub provenance: Provenance,
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for adding a trade by hand
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTradeRequest {
    pub code: String,
    /// Set once the initial trade list has been confirmed
    #[serde(default)]
    pub after_confirmation: bool,
}
