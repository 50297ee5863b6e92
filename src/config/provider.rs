//! Upstream provider configuration

use crate::registry::{ModelSpec, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One `[providers.<id>]` section: endpoint, credentials and tier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// OpenAI-compatible base URL, e.g. "https://openrouter.ai/api/v1".
    pub base_url: String,
    /// Environment variable holding the API key. None for unauthenticated
    /// local endpoints.
    pub api_key_env: Option<String>,
    /// Tier label → model and rates.
    pub tiers: HashMap<Tier, ModelSpec>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            api_key_env: None,
            tiers: HashMap::new(),
        }
    }
}
