//! Provider routing with a single same-request fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{DraftingOracle, OracleRequest, ProviderKind, TaskKind};
use crate::error::{PipelineError, PipelineResult};

/// Routes a task to its primary provider and, on failure, once to the fallback.
#[derive(Clone)]
pub struct OracleRouter {
    providers: HashMap<ProviderKind, Arc<dyn DraftingOracle>>,
    timeout: Duration,
}

impl OracleRouter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            timeout,
        }
    }

    pub fn with_provider(mut self, oracle: Arc<dyn DraftingOracle>) -> Self {
        self.providers.insert(oracle.provider(), oracle);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.providers.keys().copied()
    }

    /// Run one completion for `task`.
    ///
    /// The user instruction is cut to the task's prompt budget. Each provider
    /// call is bounded by the router timeout; the fallback is tried exactly
    /// once, after which the task fails with `OracleUnavailable`.
    #[instrument(skip(self, system, user), fields(task = %task))]
    pub async fn complete(
        &self,
        task: TaskKind,
        system: &str,
        user: &str,
    ) -> PipelineResult<String> {
        let budget = task.budget();
        let user = truncate_to_budget(user, budget.max_prompt_chars);

        let chain: Vec<&Arc<dyn DraftingOracle>> = task
            .provider_order()
            .iter()
            .filter_map(|kind| self.providers.get(kind))
            .collect();

        if chain.is_empty() {
            return Err(PipelineError::OracleUnavailable {
                task,
                message: "no oracle provider configured".to_string(),
            });
        }

        let request = OracleRequest {
            task,
            system,
            user,
            max_tokens: budget.max_tokens,
            temperature: budget.temperature,
            json_object: task.expects_object(),
        };

        let mut failures = Vec::with_capacity(chain.len());
        for (attempt, oracle) in chain.iter().enumerate() {
            if attempt > 0 {
                warn!(
                    provider = %oracle.provider(),
                    previous_error = %failures.last().map(String::as_str).unwrap_or_default(),
                    "Falling back to secondary oracle provider"
                );
            }

            match tokio::time::timeout(self.timeout, oracle.complete(&request)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    debug!(
                        provider = %oracle.provider(),
                        model = oracle.model_name(),
                        chars = text.len(),
                        "Oracle completion received"
                    );
                    return Ok(text);
                }
                Ok(Ok(_)) => failures.push(format!("{}: empty response", oracle.provider())),
                Ok(Err(e)) => failures.push(format!("{}: {e:#}", oracle.provider())),
                Err(_) => failures.push(format!(
                    "{}: timed out after {}s",
                    oracle.provider(),
                    self.timeout.as_secs()
                )),
            }
        }

        Err(PipelineError::OracleUnavailable {
            task,
            message: failures.join("; "),
        })
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_to_budget(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            warn!(
                max_chars,
                original_chars = text.chars().count(),
                "Prompt exceeds task budget, truncating"
            );
            &text[..idx]
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Scripted {
        kind: ProviderKind,
        reply: Result<&'static str, &'static str>,
        delay: Option<Duration>,
        calls: Mutex<Vec<TaskKind>>,
    }

    impl Scripted {
        fn new(kind: ProviderKind, reply: Result<&'static str, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply,
                delay: None,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DraftingOracle for Scripted {
        async fn complete(&self, request: &OracleRequest<'_>) -> anyhow::Result<String> {
            self.calls.lock().push(request.task);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply
                .map(str::to_string)
                .map_err(|e| anyhow::anyhow!(e))
        }

        fn provider(&self) -> ProviderKind {
            self.kind
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let openai = Scripted::new(ProviderKind::OpenAi, Ok("[]"));
        let anthropic = Scripted::new(ProviderKind::Anthropic, Ok("[1]"));
        let router = OracleRouter::new(Duration::from_secs(5))
            .with_provider(openai.clone())
            .with_provider(anthropic.clone());

        let out = router
            .complete(TaskKind::TradeDetection, "sys", "user")
            .await
            .unwrap();
        assert_eq!(out, "[]");
        assert_eq!(openai.calls.lock().len(), 1);
        assert!(anthropic.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn falls_back_exactly_once() {
        let anthropic = Scripted::new(ProviderKind::Anthropic, Err("overloaded"));
        let openai = Scripted::new(ProviderKind::OpenAi, Err("rate limited"));
        let router = OracleRouter::new(Duration::from_secs(5))
            .with_provider(openai.clone())
            .with_provider(anthropic.clone());

        let err = router
            .complete(TaskKind::TradeQuestions, "sys", "user")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::OracleUnavailable {
                task: TaskKind::TradeQuestions,
                ..
            }
        ));
        assert_eq!(anthropic.calls.lock().len(), 1);
        assert_eq!(openai.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn timeout_triggers_fallback() {
        let slow = Arc::new(Scripted {
            kind: ProviderKind::Anthropic,
            reply: Ok("[]"),
            delay: Some(Duration::from_millis(200)),
            calls: Mutex::new(Vec::new()),
        });
        let fast = Scripted::new(ProviderKind::OpenAi, Ok("[\"ok\"]"));
        let router = OracleRouter::new(Duration::from_millis(20))
            .with_provider(slow)
            .with_provider(fast);

        let out = router
            .complete(TaskKind::LvGeneration, "sys", "user")
            .await
            .unwrap();
        assert_eq!(out, "[\"ok\"]");
    }

    #[tokio::test]
    async fn no_providers_is_unavailable() {
        let router = OracleRouter::new(Duration::from_secs(1));
        assert!(router.is_empty());
        let err = router
            .complete(TaskKind::IntakeQuestions, "s", "u")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ORACLE_UNAVAILABLE");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_budget("Größe", 3), "Grö");
        assert_eq!(truncate_to_budget("kurz", 10), "kurz");
    }
}
