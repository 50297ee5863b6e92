//! Retry and chain-walking across providers.
//!
//! Given a primary route decision, builds the candidate chain
//! (primary → secondary → tertiary) and attempts the provider call.
//! Transient failures consume the per-candidate retry budget; permanent
//! failures advance immediately. Every attempt is charged to the ledger at
//! its pre-call estimate and recorded, success or not.

use crate::api::types::ChatMessage;
use crate::budget::BudgetLedger;
use crate::config::routing::RoutingConfig;
use crate::estimate;
use crate::provider::{ProviderClient, ProviderRequest, ProviderResponse};
use crate::registry::{ProviderRegistry, Tier};
use crate::routing::RouteDecision;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Position of a candidate in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateRank {
    Primary,
    Secondary,
    Tertiary,
}

impl fmt::Display for CandidateRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateRank::Primary => "primary",
            CandidateRank::Secondary => "secondary",
            CandidateRank::Tertiary => "tertiary",
        };
        f.write_str(s)
    }
}

/// One provider/model candidate for this request.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
    pub tier: Tier,
    pub rank: CandidateRank,
}

/// How one call attempt ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "detail")]
pub enum AttemptOutcome {
    Success,
    /// Sanitized error description; never the raw upstream body.
    Failed(String),
    /// The ledger refused the attempt's estimated cost.
    BudgetRefused(String),
}

/// Record of one attempt against one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub rank: CandidateRank,
    pub attempt: u32,
    pub provider: String,
    pub model: String,
    pub outcome: AttemptOutcome,
}

/// Successful fallback execution.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub response: ProviderResponse,
    pub provider: String,
    pub model: String,
    pub rank: CandidateRank,
    pub attempts: Vec<AttemptRecord>,
}

/// Terminal failure: the whole chain is spent.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("All fallback candidates exhausted after {} attempts", attempts.len())]
    Exhausted { attempts: Vec<AttemptRecord> },
}

pub struct FallbackController {
    registry: Arc<ProviderRegistry>,
    ledger: Arc<BudgetLedger>,
    clients: HashMap<String, Arc<dyn ProviderClient>>,
    config: RoutingConfig,
}

impl FallbackController {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        ledger: Arc<BudgetLedger>,
        clients: HashMap<String, Arc<dyn ProviderClient>>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            clients,
            config,
        }
    }

    /// Build the candidate chain for one request.
    ///
    /// Secondary is the same tier on the next preferred provider, else a
    /// cheaper tier on the primary provider. Tertiary is the cheapest
    /// in-budget tier anywhere. Duplicates and the excluded provider are
    /// filtered out.
    pub fn build_chain(
        &self,
        primary: &RouteDecision,
        prompt_tokens: u32,
        completion_tokens: u32,
        exclude_provider: Option<&str>,
    ) -> Vec<Candidate> {
        let mut chain = vec![Candidate {
            provider: primary.provider.clone(),
            model: primary.model.clone(),
            tier: primary.tier,
            rank: CandidateRank::Primary,
        }];

        let in_budget = |provider: &str, tier: Tier| -> Option<String> {
            let spec = self.registry.model_for(provider, tier)?;
            let cost = estimate::cost_usd(prompt_tokens, completion_tokens, spec);
            self.ledger
                .estimate_and_check(provider, cost)
                .is_allowed()
                .then(|| spec.model.clone())
        };
        let taken = |chain: &[Candidate], provider: &str, model: &str| {
            chain
                .iter()
                .any(|c| c.provider == provider && c.model == model)
        };

        // Secondary: same tier, next provider in the policy ordering.
        let ordering: Vec<String> = self
            .config
            .rule(primary.intent.as_str())
            .map(|r| r.providers.clone())
            .unwrap_or_default();
        let mut secondary = ordering
            .iter()
            .filter(|p| p.as_str() != primary.provider && Some(p.as_str()) != exclude_provider)
            .find_map(|p| {
                in_budget(p, primary.tier).map(|model| Candidate {
                    provider: p.clone(),
                    model,
                    tier: primary.tier,
                    rank: CandidateRank::Secondary,
                })
            });
        // Else: cheaper tier on the primary provider.
        if secondary.is_none() {
            if let Some(tier) = self.registry.cheaper_tier(&primary.provider, primary.tier) {
                secondary = in_budget(&primary.provider, tier).map(|model| Candidate {
                    provider: primary.provider.clone(),
                    model,
                    tier,
                    rank: CandidateRank::Secondary,
                });
            }
        }
        if let Some(c) = secondary {
            if !taken(&chain, &c.provider, &c.model) {
                chain.push(c);
            }
        }

        // Tertiary: cheapest in-budget tier on any provider.
        let tertiary = self
            .registry
            .tiers_by_cheapness()
            .into_iter()
            .filter(|(p, _)| Some(p.as_str()) != exclude_provider)
            .find_map(|(p, t)| {
                in_budget(&p, t).and_then(|model| {
                    (!taken(&chain, &p, &model)).then_some(Candidate {
                        provider: p,
                        model,
                        tier: t,
                        rank: CandidateRank::Tertiary,
                    })
                })
            });
        if let Some(c) = tertiary {
            chain.push(c);
        }

        chain
    }

    /// Walk the chain until one candidate succeeds.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        primary: &RouteDecision,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        prompt_tokens: u32,
        completion_tokens: u32,
        exclude_provider: Option<&str>,
    ) -> Result<FallbackOutcome, FallbackError> {
        let chain = self.build_chain(primary, prompt_tokens, completion_tokens, exclude_provider);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for candidate in chain {
            let Some(client) = self.clients.get(&candidate.provider) else {
                tracing::debug!(provider = %candidate.provider, "No client for candidate, skipping");
                continue;
            };
            let Some(spec) = self.registry.model_for(&candidate.provider, candidate.tier) else {
                continue;
            };
            let cost = estimate::cost_usd(prompt_tokens, completion_tokens, spec);

            let max_attempts = 1 + self.config.max_retries;
            for attempt in 1..=max_attempts {
                // Cost is estimated pre-call and charged regardless of the
                // attempt's outcome; a refusal ends this candidate.
                if let Err(verdict) = self.ledger.try_charge(&candidate.provider, cost) {
                    attempts.push(AttemptRecord {
                        rank: candidate.rank,
                        attempt,
                        provider: candidate.provider.clone(),
                        model: candidate.model.clone(),
                        outcome: AttemptOutcome::BudgetRefused(verdict.describe()),
                    });
                    break;
                }

                let request = ProviderRequest {
                    messages: messages.to_vec(),
                    model: candidate.model.clone(),
                    max_tokens,
                    temperature,
                };

                match client.complete(request).await {
                    Ok(response) => {
                        attempts.push(AttemptRecord {
                            rank: candidate.rank,
                            attempt,
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            outcome: AttemptOutcome::Success,
                        });
                        tracing::info!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            rank = %candidate.rank,
                            attempt,
                            "Provider call succeeded"
                        );
                        return Ok(FallbackOutcome {
                            response,
                            provider: candidate.provider,
                            model: candidate.model,
                            rank: candidate.rank,
                            attempts,
                        });
                    }
                    Err(e) => {
                        let transient = e.is_transient();
                        tracing::warn!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            rank = %candidate.rank,
                            attempt,
                            transient,
                            error = %e.sanitized(),
                            "Provider call failed"
                        );
                        attempts.push(AttemptRecord {
                            rank: candidate.rank,
                            attempt,
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            outcome: AttemptOutcome::Failed(e.sanitized()),
                        });
                        if !transient {
                            break;
                        }
                    }
                }
            }
        }

        Err(FallbackError::Exhausted { attempts })
    }
}
