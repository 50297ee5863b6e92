//! Upstream provider abstraction.
//!
//! The router talks to every upstream through the narrow [`ProviderClient`]
//! interface; wire formats stay behind it. The shipped implementation speaks
//! the OpenAI chat-completions protocol, which covers OpenRouter, OpenAI,
//! LM Studio and most local inference servers.

pub mod error;
pub mod openai_compat;

pub use error::ProviderError;
pub use openai_compat::OpenAICompatClient;

use crate::api::types::ChatMessage;
use crate::registry::ProviderRegistry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Normalized request handed to a provider client.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Normalized provider reply.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Narrow interface to one upstream provider.
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    /// Provider id this client serves (matches the registry key).
    fn id(&self) -> &str;

    /// Execute one chat completion against the upstream.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

/// Build one client per enabled provider from the registry.
///
/// API keys are resolved from the environment once at startup. A provider
/// whose key env is unset still gets a client; the auth failure surfaces
/// on first use as a permanent error.
pub fn build_clients(
    registry: &ProviderRegistry,
    http: Arc<reqwest::Client>,
    call_timeout: Duration,
) -> HashMap<String, Arc<dyn ProviderClient>> {
    let mut clients: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
    for provider in registry.enabled_providers() {
        let api_key = provider
            .api_key_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok());
        let client = OpenAICompatClient::new(
            provider.id.clone(),
            provider.base_url.clone(),
            api_key,
            Arc::clone(&http),
            call_timeout,
        );
        clients.insert(provider.id.clone(), Arc::new(client));
    }
    clients
}
