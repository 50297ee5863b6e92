//! Context compaction and durable-memory configuration

use crate::registry::Tier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the context compactor and its durable stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Behavior-rule text injected as one system snapshot at the front of
    /// every compacted context. Empty disables the injection.
    pub behavior_rules: String,
    /// JSON-lines file holding pinned items across restarts.
    pub pins_file: PathBuf,
    /// Directory receiving one dated journal file per day of summaries.
    pub summaries_dir: PathBuf,
    /// Non-pinned blocks larger than this many characters are treated as
    /// tool-output noise and stripped.
    pub max_block_chars: usize,
    /// Regex patterns for banner/boilerplate lines to strip.
    pub banner_patterns: Vec<String>,
    /// Upper bound on messages folded into one rolling summary.
    pub span_max_messages: usize,
    /// Tier used for summarization calls.
    pub summarizer_tier: Tier,
    /// Tier used for summarization when the request priority is high.
    pub summarizer_tier_high: Tier,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            behavior_rules: String::new(),
            pins_file: PathBuf::from("memory/pins.jsonl"),
            summaries_dir: PathBuf::from("memory/router-summaries"),
            max_block_chars: 6000,
            banner_patterns: Vec::new(),
            span_max_messages: 12,
            summarizer_tier: Tier::FallbackCheap,
            summarizer_tier_high: Tier::CheapChat,
        }
    }
}

impl ContextConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.span_max_messages == 0 {
            return Err("span_max_messages must be >= 1".to_string());
        }
        for pattern in &self.banner_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(format!("invalid banner pattern '{}': {}", pattern, e));
            }
        }
        Ok(())
    }
}
