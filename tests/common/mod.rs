//! Shared test utilities for Switchboard integration tests.
//!
//! Provides a fixture configuration, stub provider clients and a stub
//! summarizer so the full request path can run without upstream calls.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard::api::{create_router, AppState};
use switchboard::budget::BudgetLedger;
use switchboard::config::provider::ProviderConfig;
use switchboard::config::routing::PolicyRule;
use switchboard::config::SwitchboardConfig;
use switchboard::context::{PinStore, Summarizer};
use switchboard::provider::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse};
use switchboard::registry::{ModelSpec, ProviderRegistry, Tier};
use tower::ServiceExt;

pub fn tier_spec(model: &str, input: f64, output: f64) -> ModelSpec {
    ModelSpec {
        model: model.to_string(),
        input_cost_per_million: input,
        output_cost_per_million: output,
    }
}

/// Three providers: free `local`, mid-priced `openrouter`, pricey `openai`.
/// Rates are inflated (interpreted per-million) so a few thousand tokens
/// move the budget needle in tests.
pub fn fixture_config(dir: &tempfile::TempDir) -> SwitchboardConfig {
    let mut config = SwitchboardConfig::default();

    let mut local = ProviderConfig {
        base_url: "http://127.0.0.1:1234/v1".to_string(),
        ..Default::default()
    };
    local.tiers.insert(Tier::CheapChat, tier_spec("local-chat", 0.0, 0.0));
    local.tiers.insert(Tier::FallbackCheap, tier_spec("local-mini", 0.0, 0.0));
    config.providers.insert("local".to_string(), local);

    let mut openrouter = ProviderConfig {
        base_url: "https://openrouter.test/api/v1".to_string(),
        ..Default::default()
    };
    openrouter
        .tiers
        .insert(Tier::CheapChat, tier_spec("or-chat", 120.0, 300.0));
    openrouter
        .tiers
        .insert(Tier::CodePrimary, tier_spec("or-coder", 200.0, 200.0));
    config.providers.insert("openrouter".to_string(), openrouter);

    let mut openai = ProviderConfig {
        base_url: "https://openai.test/v1".to_string(),
        ..Default::default()
    };
    openai.tiers.insert(Tier::CheapChat, tier_spec("oa-mini", 150.0, 600.0));
    openai.tiers.insert(Tier::CodePrimary, tier_spec("oa-code", 2500.0, 10000.0));
    config.providers.insert("openai".to_string(), openai);

    config.routing.policy.insert(
        "chat".to_string(),
        PolicyRule {
            tier: Tier::CheapChat,
            providers: vec!["local".into(), "openrouter".into(), "openai".into()],
        },
    );
    config.routing.policy.insert(
        "code".to_string(),
        PolicyRule {
            tier: Tier::CodePrimary,
            providers: vec!["openai".into(), "openrouter".into()],
        },
    );
    config.routing.policy.insert(
        "verify".to_string(),
        PolicyRule {
            tier: Tier::CheapChat,
            providers: vec!["openrouter".into(), "openai".into()],
        },
    );

    // Daily headroom large enough that a single pricey-tier call fits.
    config.budget.daily_cap_usd = Some(20.0);

    config.context.pins_file = dir.path().join("pins.jsonl");
    config.context.summaries_dir = dir.path().join("summaries");
    config.logging.request_log = dir.path().join("logs/requests.log");
    config.logging.error_log = dir.path().join("logs/errors.log");
    config.logging.context_log = dir.path().join("logs/context.log");
    config
}

/// Client that always answers with a fixed body.
pub struct StaticClient {
    pub id: String,
    pub text: String,
}

#[async_trait]
impl ProviderClient for StaticClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            text: self.text.clone(),
            tokens_in: 42,
            tokens_out: 7,
        })
    }
}

/// Client that always fails with the given HTTP status.
pub struct FailingClient {
    pub id: String,
    pub status: u16,
}

#[async_trait]
impl ProviderClient for FailingClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Upstream {
            status: self.status,
            message: "stub failure".to_string(),
        })
    }
}

/// Summarizer with a canned reply; never calls upstream.
pub struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(
        &self,
        _text: &str,
        _tier: Tier,
        _min_tokens: u32,
        _max_tokens: u32,
    ) -> Result<String, ProviderError> {
        Ok("Earlier conversation, condensed.".to_string())
    }
}

/// Static success clients for every fixture provider.
pub fn static_clients() -> HashMap<String, Arc<dyn ProviderClient>> {
    let mut clients: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
    for id in ["local", "openrouter", "openai"] {
        clients.insert(
            id.to_string(),
            Arc::new(StaticClient {
                id: id.to_string(),
                text: format!("answer from {}", id),
            }),
        );
    }
    clients
}

/// Assemble an app around the fixture config and the given clients.
pub async fn make_app(
    config: SwitchboardConfig,
    clients: HashMap<String, Arc<dyn ProviderClient>>,
) -> (axum::Router, Arc<AppState>) {
    let config = Arc::new(config);
    let registry = Arc::new(ProviderRegistry::from_config(&config).unwrap());
    let ledger = Arc::new(BudgetLedger::new(config.budget.clone()));
    let pins = Arc::new(PinStore::load(&config.context.pins_file).await.unwrap());

    let state = Arc::new(AppState::assemble(
        config,
        registry,
        ledger,
        clients,
        Arc::new(StubSummarizer),
        pins,
    ));
    (create_router(Arc::clone(&state)), state)
}

/// POST a JSON body to /v1/chat/completions.
pub async fn post_completions(
    app: axum::Router,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// GET /health.
pub async fn get_health(app: axum::Router) -> serde_json::Value {
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
