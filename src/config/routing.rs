//! Routing policy configuration

use crate::registry::Tier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the routing policy table: the tier an intent maps to and the
/// preferred provider ordering for that tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub tier: Tier,
    pub providers: Vec<String>,
}

/// Routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Priority assumed when the request metadata carries none.
    pub default_priority: String,
    /// Transient-failure retries per fallback candidate.
    pub max_retries: u32,
    /// Whether `metadata.route` overrides are honored.
    pub allow_route_override: bool,
    /// Whether `metadata.model` overrides are honored.
    pub allow_model_override: bool,
    /// Intent → policy row. Keys: chat / code / reasoning / vision / verify.
    pub policy: HashMap<String, PolicyRule>,
    /// Extra keyword lists feeding intent inference, keyed by intent.
    pub intent_keywords: HashMap<String, Vec<String>>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_priority: "normal".to_string(),
            max_retries: 2,
            allow_route_override: true,
            allow_model_override: true,
            policy: HashMap::new(),
            intent_keywords: HashMap::new(),
        }
    }
}

impl RoutingConfig {
    pub fn rule(&self, intent: &str) -> Option<&PolicyRule> {
        self.policy.get(intent)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.default_priority.as_str(), "low" | "normal" | "high") {
            return Err(format!(
                "default_priority must be low/normal/high, got '{}'",
                self.default_priority
            ));
        }
        for (intent, rule) in &self.policy {
            if !matches!(
                intent.as_str(),
                "chat" | "code" | "reasoning" | "vision" | "verify"
            ) {
                return Err(format!("unknown intent '{}' in routing policy", intent));
            }
            if rule.providers.is_empty() {
                return Err(format!("intent '{}' has an empty provider list", intent));
            }
        }
        Ok(())
    }
}
