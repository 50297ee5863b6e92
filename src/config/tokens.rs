//! Token budget configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Context-window limits for one priority class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenLimits {
    /// Soft target compaction tries to reach before summarizing/dropping.
    pub target_input_tokens: u32,
    /// Absolute ceiling after compaction.
    pub hard_max_input_tokens: u32,
}

/// Token accounting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    /// Safety margin on top of the chars/4 heuristic, percent.
    pub safety_margin_percent: u8,
    /// Assumed completion size when the request carries no max_tokens.
    pub default_completion_tokens: u32,
    /// Requested lower bound for rolling summaries.
    pub summary_min_tokens: u32,
    /// Requested upper bound for rolling summaries.
    pub summary_max_tokens: u32,
    /// Per-priority context limits, keyed by "low" / "normal" / "high".
    pub priorities: HashMap<String, TokenLimits>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        let mut priorities = HashMap::new();
        priorities.insert(
            "low".to_string(),
            TokenLimits {
                target_input_tokens: 4000,
                hard_max_input_tokens: 8000,
            },
        );
        priorities.insert(
            "normal".to_string(),
            TokenLimits {
                target_input_tokens: 6000,
                hard_max_input_tokens: 10000,
            },
        );
        priorities.insert(
            "high".to_string(),
            TokenLimits {
                target_input_tokens: 8000,
                hard_max_input_tokens: 14000,
            },
        );
        Self {
            safety_margin_percent: 10,
            default_completion_tokens: 512,
            summary_min_tokens: 350,
            summary_max_tokens: 500,
            priorities,
        }
    }
}

impl TokensConfig {
    /// Limits for a priority, falling back to "normal" for unknown keys.
    pub fn limits_for(&self, priority: &str) -> TokenLimits {
        self.priorities
            .get(priority)
            .or_else(|| self.priorities.get("normal"))
            .copied()
            .unwrap_or(TokenLimits {
                target_input_tokens: 6000,
                hard_max_input_tokens: 10000,
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.summary_min_tokens > self.summary_max_tokens {
            return Err("summary_min_tokens must be <= summary_max_tokens".to_string());
        }
        for (priority, limits) in &self.priorities {
            if limits.target_input_tokens > limits.hard_max_input_tokens {
                return Err(format!(
                    "priority '{}': target_input_tokens exceeds hard_max_input_tokens",
                    priority
                ));
            }
        }
        Ok(())
    }
}
