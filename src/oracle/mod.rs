//! Drafting Oracle integration.
//!
//! The oracle is an external text-completion service that turns a system and
//! a user instruction into free text expected to contain JSON. Two providers
//! are supported; [`OracleRouter`] picks the order per task kind and falls
//! back exactly once. [`repair`] turns sloppy output into JSON values.

pub mod anthropic;
pub mod openai;
pub mod repair;
pub mod router;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicOracle;
pub use openai::OpenAiOracle;
pub use router::OracleRouter;

/// A concrete oracle provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Anthropic => f.write_str("anthropic"),
        }
    }
}

/// The task an oracle call serves. Drives provider order and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    TradeDetection,
    IntakeQuestions,
    TradeQuestions,
    FollowUpQuestions,
    TradeRecommendation,
    LvGeneration,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TradeDetection => "trade_detection",
            Self::IntakeQuestions => "intake_questions",
            Self::TradeQuestions => "trade_questions",
            Self::FollowUpQuestions => "follow_up_questions",
            Self::TradeRecommendation => "trade_recommendation",
            Self::LvGeneration => "lv_generation",
        };
        f.write_str(s)
    }
}

/// Hard limits for one oracle call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskBudget {
    pub max_tokens: u32,
    pub max_prompt_chars: usize,
    pub temperature: f32,
}

impl TaskKind {
    /// Only these kinds may degrade to an empty result when every provider fails.
    pub fn tolerates_outage(self) -> bool {
        matches!(self, Self::FollowUpQuestions | Self::TradeRecommendation)
    }

    /// Primary provider first, fallback second.
    pub fn provider_order(self) -> [ProviderKind; 2] {
        use ProviderKind::*;
        match self {
            Self::TradeQuestions | Self::LvGeneration => [Anthropic, OpenAi],
            Self::TradeDetection
            | Self::IntakeQuestions
            | Self::FollowUpQuestions
            | Self::TradeRecommendation => [OpenAi, Anthropic],
        }
    }

    pub fn budget(self) -> TaskBudget {
        let (max_tokens, max_prompt_chars, temperature) = match self {
            Self::TradeDetection => (3_000, 12_000, 0.3),
            Self::IntakeQuestions => (4_000, 16_000, 0.5),
            Self::TradeQuestions => (6_000, 24_000, 0.5),
            Self::FollowUpQuestions => (3_000, 16_000, 0.5),
            Self::TradeRecommendation => (2_000, 12_000, 0.3),
            Self::LvGeneration => (10_000, 40_000, 0.3),
        };
        TaskBudget {
            max_tokens,
            max_prompt_chars,
            temperature,
        }
    }

    /// Whether the expected output is a JSON object (rather than an array).
    pub fn expects_object(self) -> bool {
        matches!(
            self,
            Self::TradeDetection | Self::TradeRecommendation | Self::LvGeneration
        )
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub task: TaskKind,
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a top-level JSON object where it supports that.
    pub json_object: bool,
}

/// A text-completion provider.
#[async_trait]
pub trait DraftingOracle: Send + Sync {
    /// Send system + user instructions, return the raw completion text.
    async fn complete(&self, request: &OracleRequest<'_>) -> anyhow::Result<String>;

    fn provider(&self) -> ProviderKind;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskKind; 6] = [
        TaskKind::TradeDetection,
        TaskKind::IntakeQuestions,
        TaskKind::TradeQuestions,
        TaskKind::FollowUpQuestions,
        TaskKind::TradeRecommendation,
        TaskKind::LvGeneration,
    ];

    #[test]
    fn exactly_two_kinds_tolerate_outage() {
        assert_eq!(ALL.iter().filter(|t| t.tolerates_outage()).count(), 2);
        assert!(!TaskKind::TradeDetection.tolerates_outage());
        assert!(!TaskKind::TradeQuestions.tolerates_outage());
    }

    #[test]
    fn primary_and_fallback_differ() {
        for task in ALL {
            let [primary, fallback] = task.provider_order();
            assert_ne!(primary, fallback, "{task}");
        }
    }
}
