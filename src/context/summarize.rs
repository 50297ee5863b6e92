//! Summarization backend for the context compactor.
//!
//! Kept behind a trait so the compactor stays testable without upstream
//! calls. The real implementation routes through whichever in-budget
//! provider serves the requested tier most cheaply.

use crate::api::types::ChatMessage;
use crate::budget::BudgetLedger;
use crate::estimate;
use crate::provider::{ProviderClient, ProviderError, ProviderRequest};
use crate::registry::{ProviderRegistry, Tier};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Produces a bounded summary of a conversation excerpt.
#[async_trait]
pub trait Summarizer: Send + Sync + 'static {
    async fn summarize(
        &self,
        text: &str,
        tier: Tier,
        min_tokens: u32,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

/// Summarizer that calls an upstream provider at a given tier.
pub struct TierSummarizer {
    registry: Arc<ProviderRegistry>,
    ledger: Arc<BudgetLedger>,
    clients: HashMap<String, Arc<dyn ProviderClient>>,
    margin_percent: u8,
}

impl TierSummarizer {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        ledger: Arc<BudgetLedger>,
        clients: HashMap<String, Arc<dyn ProviderClient>>,
        margin_percent: u8,
    ) -> Self {
        Self {
            registry,
            ledger,
            clients,
            margin_percent,
        }
    }

    /// Providers serving `tier`, cheapest first.
    fn candidates(&self, tier: Tier) -> Vec<String> {
        self.registry
            .tiers_by_cheapness()
            .into_iter()
            .filter(|(_, t)| *t == tier)
            .map(|(p, _)| p)
            .collect()
    }
}

#[async_trait]
impl Summarizer for TierSummarizer {
    async fn summarize(
        &self,
        text: &str,
        tier: Tier,
        min_tokens: u32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let prompt_tokens = estimate::approx_tokens(text, self.margin_percent);
        let instruction = format!(
            "Condense the following conversation excerpt into roughly {}-{} tokens. \
             Keep decisions, facts, names and open questions. Reply with the summary only.",
            min_tokens, max_tokens
        );

        let mut last_err = ProviderError::Configuration(format!(
            "no provider serves summarizer tier {}",
            tier
        ));

        for provider_id in self.candidates(tier) {
            let Some(spec) = self.registry.model_for(&provider_id, tier) else {
                continue;
            };
            let Some(client) = self.clients.get(&provider_id) else {
                continue;
            };

            let cost = estimate::cost_usd(prompt_tokens, max_tokens, spec);
            if let Err(verdict) = self.ledger.try_charge(&provider_id, cost) {
                tracing::debug!(
                    provider = %provider_id,
                    verdict = %verdict.describe(),
                    "Summarizer provider skipped on budget"
                );
                last_err = ProviderError::Configuration(format!(
                    "summarizer budget refused on '{}': {}",
                    provider_id,
                    verdict.describe()
                ));
                continue;
            }

            let request = ProviderRequest {
                messages: vec![ChatMessage::system(instruction.clone()), ChatMessage::user(text)],
                model: spec.model.clone(),
                max_tokens: Some(max_tokens),
                temperature: Some(0.3),
            };

            match client.complete(request).await {
                Ok(response) => return Ok(response.text),
                Err(e) => {
                    tracing::warn!(provider = %provider_id, error = %e.sanitized(), "Summarizer call failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}
