//! Static description of upstream providers, their model tiers and cost rates.
//!
//! The registry is built once from configuration at startup, validated
//! fail-fast, and never mutated afterwards. Every other subsystem treats it
//! as a read-only lookup table behind an `Arc`.

pub mod error;

pub use error::RegistryError;

use crate::config::SwitchboardConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Named quality/cost class of model, abstracted from vendor model ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    CheapChat,
    CodePrimary,
    ReasoningPrimary,
    VisionPrimary,
    FallbackCheap,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::CheapChat => "CHEAP_CHAT",
            Tier::CodePrimary => "CODE_PRIMARY",
            Tier::ReasoningPrimary => "REASONING_PRIMARY",
            Tier::VisionPrimary => "VISION_PRIMARY",
            Tier::FallbackCheap => "FALLBACK_CHEAP",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHEAP_CHAT" => Ok(Tier::CheapChat),
            "CODE_PRIMARY" => Ok(Tier::CodePrimary),
            "REASONING_PRIMARY" => Ok(Tier::ReasoningPrimary),
            "VISION_PRIMARY" => Ok(Tier::VisionPrimary),
            "FALLBACK_CHEAP" => Ok(Tier::FallbackCheap),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

/// A concrete model behind a tier, with its per-million-token rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model: String,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl ModelSpec {
    /// Single figure used to order tiers by cheapness. Output tokens dominate
    /// real spend, so they are weighted into the blend rather than averaged away.
    pub fn blended_rate(&self) -> f64 {
        self.input_cost_per_million + self.output_cost_per_million
    }
}

/// One upstream provider: where to reach it and which tiers it serves.
#[derive(Debug, Clone)]
pub struct Provider {
    pub id: String,
    pub enabled: bool,
    pub base_url: String,
    pub api_key_env: Option<String>,
    pub tiers: HashMap<Tier, ModelSpec>,
}

/// Immutable provider/tier/rate table.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Provider>,
}

impl ProviderRegistry {
    /// Build and validate the registry from configuration.
    ///
    /// Fails fast on malformed tier entries and on routing-policy references
    /// to providers or tiers that do not exist.
    pub fn from_config(config: &SwitchboardConfig) -> Result<Self, RegistryError> {
        if config.providers.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut providers = BTreeMap::new();
        for (id, pc) in &config.providers {
            let mut tiers = HashMap::new();
            for (tier, spec) in &pc.tiers {
                if spec.model.is_empty() {
                    return Err(RegistryError::MissingModel {
                        provider: id.clone(),
                        tier: tier.to_string(),
                    });
                }
                if spec.input_cost_per_million < 0.0 || spec.output_cost_per_million < 0.0 {
                    return Err(RegistryError::InvalidRate {
                        provider: id.clone(),
                        tier: tier.to_string(),
                    });
                }
                tiers.insert(*tier, spec.clone());
            }
            providers.insert(
                id.clone(),
                Provider {
                    id: id.clone(),
                    enabled: pc.enabled,
                    base_url: pc.base_url.clone(),
                    api_key_env: pc.api_key_env.clone(),
                    tiers,
                },
            );
        }

        // Cross-check the routing policy against what was just loaded.
        for (intent, rule) in &config.routing.policy {
            let mut tier_served = false;
            for provider in &rule.providers {
                let Some(p) = providers.get(provider) else {
                    return Err(RegistryError::UnknownProvider {
                        provider: provider.clone(),
                        intent: intent.clone(),
                    });
                };
                if p.tiers.contains_key(&rule.tier) {
                    tier_served = true;
                }
            }
            if !rule.providers.is_empty() && !tier_served {
                return Err(RegistryError::UnroutableTier {
                    tier: rule.tier.to_string(),
                    intent: intent.clone(),
                });
            }
        }

        Ok(Self { providers })
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    /// Enabled providers, in stable id order.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values().filter(|p| p.enabled)
    }

    /// The model serving `tier` on `provider`, if configured and enabled.
    pub fn model_for(&self, provider: &str, tier: Tier) -> Option<&ModelSpec> {
        self.providers
            .get(provider)
            .filter(|p| p.enabled)
            .and_then(|p| p.tiers.get(&tier))
    }

    /// Next cheaper tier configured on `provider`, by blended rate.
    pub fn cheaper_tier(&self, provider: &str, than: Tier) -> Option<Tier> {
        let p = self.providers.get(provider).filter(|p| p.enabled)?;
        let current = p.tiers.get(&than)?.blended_rate();
        p.tiers
            .iter()
            .filter(|(t, spec)| **t != than && spec.blended_rate() < current)
            .max_by(|a, b| a.1.blended_rate().total_cmp(&b.1.blended_rate()))
            .map(|(t, _)| *t)
    }

    /// Cheapest tier configured on `provider`, by blended rate.
    pub fn cheapest_tier(&self, provider: &str) -> Option<Tier> {
        let p = self.providers.get(provider).filter(|p| p.enabled)?;
        p.tiers
            .iter()
            .min_by(|a, b| a.1.blended_rate().total_cmp(&b.1.blended_rate()))
            .map(|(t, _)| *t)
    }

    /// All enabled `(provider, tier)` pairs ordered cheapest first.
    pub fn tiers_by_cheapness(&self) -> Vec<(String, Tier)> {
        let mut pairs: Vec<(String, Tier, f64)> = self
            .enabled_providers()
            .flat_map(|p| {
                p.tiers
                    .iter()
                    .map(|(t, spec)| (p.id.clone(), *t, spec.blended_rate()))
            })
            .collect();
        pairs.sort_by(|a, b| a.2.total_cmp(&b.2).then_with(|| a.0.cmp(&b.0)));
        pairs.into_iter().map(|(p, t, _)| (p, t)).collect()
    }

    /// Locate the provider and tier serving an exact model id.
    ///
    /// Used to resolve explicit model overrides to a budget-checkable provider.
    pub fn locate_model(&self, model: &str) -> Option<(&Provider, Tier)> {
        self.enabled_providers().find_map(|p| {
            p.tiers
                .iter()
                .find(|(_, spec)| spec.model == model)
                .map(|(t, _)| (p, *t))
        })
    }
}
