//! Intent-based route selection.
//!
//! The selector turns (intent, priority, overrides) into a provider/model
//! decision, consulting the budget ledger so a caps-violating choice is
//! never emitted. Overrides are honored when in budget and quietly demoted
//! to policy routing when not; the demotion is recorded on the decision so
//! the orchestrator can log it.

pub mod error;
pub mod intent;

pub use error::RoutingError;

use crate::budget::BudgetLedger;
use crate::config::routing::RoutingConfig;
use crate::estimate;
use crate::registry::{ProviderRegistry, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Coarse classification of a request's purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Chat,
    Code,
    Reasoning,
    Vision,
    Verify,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Chat => "chat",
            Intent::Code => "code",
            Intent::Reasoning => "reasoning",
            Intent::Vision => "vision",
            Intent::Verify => "verify",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Intent::Chat),
            "code" => Ok(Intent::Code),
            "reasoning" => Ok(Intent::Reasoning),
            "vision" => Ok(Intent::Vision),
            "verify" => Ok(Intent::Verify),
            _ => Err(format!("Unknown intent: {}", s)),
        }
    }
}

/// Request priority. Mainly affects context budgets and summarizer tier;
/// tier choice stays intent-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Everything the selector needs to know about one request.
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub intent: Intent,
    pub priority: Priority,
    pub route_override: Option<String>,
    pub model_override: Option<String>,
    /// Provider that produced the answer under verification, when known.
    pub origin_provider: Option<String>,
    /// Estimated prompt tokens after compaction.
    pub prompt_tokens: u32,
    /// Requested or assumed completion tokens.
    pub completion_tokens: u32,
}

/// Output of route selection. Created once per attempt, logged, discarded.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub provider: String,
    pub model: String,
    pub tier: Tier,
    pub intent: Intent,
    pub priority: Priority,
    /// True when an explicit override was honored.
    pub forced: bool,
    pub reason: String,
    /// Why an override was demoted to policy routing, if one was.
    pub override_rejection: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Chooses a provider/model tier given intent, priority and override hints.
pub struct RouteSelector {
    registry: Arc<ProviderRegistry>,
    ledger: Arc<BudgetLedger>,
    config: RoutingConfig,
}

impl RouteSelector {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        ledger: Arc<BudgetLedger>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            config,
        }
    }

    /// Select a route for the query.
    ///
    /// Overrides are tried first; a budget-rejected override falls through
    /// to the policy table with the rejection recorded on the decision.
    pub fn select(&self, query: &RouteQuery) -> Result<RouteDecision, RoutingError> {
        let mut override_rejection = None;

        if let Some(result) = self.try_override(query) {
            match result {
                Ok(decision) => return Ok(decision),
                Err(reason) => {
                    tracing::info!(
                        intent = %query.intent,
                        reason = %reason,
                        "Override rejected, falling back to policy routing"
                    );
                    override_rejection = Some(reason);
                }
            }
        }

        self.select_by_policy(query, override_rejection)
    }

    /// Attempt the explicit override, if any is present and allowed.
    ///
    /// Returns None when no honorable override exists, Err(reason) when the
    /// override was requested but cannot be accepted.
    fn try_override(&self, query: &RouteQuery) -> Option<Result<RouteDecision, String>> {
        let route = query
            .route_override
            .as_deref()
            .filter(|_| self.config.allow_route_override);
        let model = query
            .model_override
            .as_deref()
            .filter(|_| self.config.allow_model_override);

        let (provider_id, tier, model_id) = match (route, model) {
            (Some(route), _) => {
                let Some(provider) = self.registry.provider(route).filter(|p| p.enabled) else {
                    return Some(Err(format!("override provider '{}' is not configured", route)));
                };
                // Prefer the policy tier for the intent when this provider
                // serves it, else fall back to the provider's cheapest tier.
                let policy_tier = self
                    .config
                    .rule(query.intent.as_str())
                    .map(|r| r.tier)
                    .filter(|t| provider.tiers.contains_key(t));
                let Some(tier) = policy_tier.or_else(|| self.registry.cheapest_tier(route)) else {
                    return Some(Err(format!("override provider '{}' has no tiers", route)));
                };
                let spec = provider.tiers.get(&tier).expect("tier just resolved");
                let model_id = model.map(|m| m.to_string()).unwrap_or_else(|| spec.model.clone());
                (provider.id.clone(), tier, model_id)
            }
            (None, Some(model)) => {
                let Some((provider, tier)) = self.registry.locate_model(model) else {
                    return Some(Err(format!("override model '{}' is not in the registry", model)));
                };
                (provider.id.clone(), tier, model.to_string())
            }
            (None, None) => return None,
        };

        if query.intent == Intent::Verify
            && query.origin_provider.as_deref() == Some(provider_id.as_str())
        {
            return Some(Err(format!(
                "verify requires a provider distinct from '{}'",
                provider_id
            )));
        }

        let spec = self.registry.model_for(&provider_id, tier)?;
        let cost = estimate::cost_usd(query.prompt_tokens, query.completion_tokens, spec);
        let verdict = self.ledger.estimate_and_check(&provider_id, cost);
        if !verdict.is_allowed() {
            return Some(Err(format!(
                "override to '{}' rejected: {}",
                provider_id,
                verdict.describe()
            )));
        }

        Some(Ok(RouteDecision {
            provider: provider_id,
            model: model_id,
            tier,
            intent: query.intent,
            priority: query.priority,
            forced: true,
            reason: format!(
                "intent={}, priority={}, tier={}, forced override",
                query.intent, query.priority, tier
            ),
            override_rejection: None,
            decided_at: Utc::now(),
        }))
    }

    fn select_by_policy(
        &self,
        query: &RouteQuery,
        override_rejection: Option<String>,
    ) -> Result<RouteDecision, RoutingError> {
        let rule = self
            .config
            .rule(query.intent.as_str())
            .ok_or_else(|| RoutingError::NoPolicy {
                intent: query.intent.to_string(),
            })?;

        // Tracks whether an in-budget candidate was skipped solely because
        // it matched the verify origin.
        let mut origin_blocked: Option<String> = None;

        // Pass 1: target tier over the preferred ordering. Pass 2: one
        // cheaper tier per provider, same ordering.
        for pass in 0..2 {
            for provider_id in &rule.providers {
                let tier = if pass == 0 {
                    rule.tier
                } else {
                    match self.registry.cheaper_tier(provider_id, rule.tier) {
                        Some(t) => t,
                        None => continue,
                    }
                };
                let Some(spec) = self.registry.model_for(provider_id, tier) else {
                    continue;
                };

                let cost = estimate::cost_usd(query.prompt_tokens, query.completion_tokens, spec);
                let allowed = self.ledger.estimate_and_check(provider_id, cost).is_allowed();

                if query.intent == Intent::Verify
                    && query.origin_provider.as_deref() == Some(provider_id.as_str())
                {
                    if allowed && origin_blocked.is_none() {
                        origin_blocked = Some(provider_id.clone());
                    }
                    continue;
                }

                if allowed {
                    let mut reason = format!(
                        "intent={}, priority={}, tier={}",
                        query.intent, query.priority, tier
                    );
                    if override_rejection.is_some() {
                        reason.push_str(", override rejected");
                    }
                    tracing::debug!(
                        provider = %provider_id,
                        model = %spec.model,
                        tier = %tier,
                        intent = %query.intent,
                        "Route decision"
                    );
                    return Ok(RouteDecision {
                        provider: provider_id.clone(),
                        model: spec.model.clone(),
                        tier,
                        intent: query.intent,
                        priority: query.priority,
                        forced: false,
                        reason,
                        override_rejection,
                        decided_at: Utc::now(),
                    });
                }
            }
        }

        if let Some(provider) = origin_blocked {
            return Err(RoutingError::VerifyConstraint { provider });
        }
        Err(RoutingError::BudgetExhausted {
            intent: query.intent.to_string(),
            tier: rule.tier.to_string(),
        })
    }
}
