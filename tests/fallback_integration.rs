//! Fallback behavior against real HTTP upstreams (wiremock): retry policy,
//! permanent-error advancement and chain exhaustion, through the production
//! wiring in `AppState::from_config`.

mod common;

use axum::http::StatusCode;
use common::post_completions;
use serde_json::json;
use std::sync::Arc;
use switchboard::api::{create_router, AppState};
use switchboard::config::provider::ProviderConfig;
use switchboard::config::routing::PolicyRule;
use switchboard::config::SwitchboardConfig;
use switchboard::registry::Tier;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-upstream",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "mock-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28}
    })
}

/// Two providers at the same tier, backed by the given mock servers.
fn two_provider_config(
    dir: &tempfile::TempDir,
    alpha_url: &str,
    beta_url: &str,
) -> SwitchboardConfig {
    let mut config = SwitchboardConfig::default();

    for (name, url) in [("alpha", alpha_url), ("beta", beta_url)] {
        let mut provider = ProviderConfig {
            base_url: url.to_string(),
            ..Default::default()
        };
        provider.tiers.insert(
            Tier::CheapChat,
            switchboard::registry::ModelSpec {
                model: format!("{}-chat", name),
                input_cost_per_million: 50.0,
                output_cost_per_million: 50.0,
            },
        );
        config.providers.insert(name.to_string(), provider);
    }

    config.routing.policy.insert(
        "chat".to_string(),
        PolicyRule {
            tier: Tier::CheapChat,
            providers: vec!["alpha".into(), "beta".into()],
        },
    );

    config.budget.daily_cap_usd = Some(50.0);
    config.context.pins_file = dir.path().join("pins.jsonl");
    config.context.summaries_dir = dir.path().join("summaries");
    config.logging.request_log = dir.path().join("logs/requests.log");
    config.logging.error_log = dir.path().join("logs/errors.log");
    config.logging.context_log = dir.path().join("logs/context.log");
    config
}

async fn app_for(config: SwitchboardConfig) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::from_config(config).await.unwrap());
    (create_router(Arc::clone(&state)), state)
}

#[tokio::test]
async fn transient_primary_failure_falls_back_to_secondary() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;

    // Alpha is down hard: three attempts (1 + 2 retries), then move on.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&alpha)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("beta says hi")))
        .expect(1)
        .mount(&beta)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = two_provider_config(&dir, &alpha.uri(), &beta.uri());
    let error_log = config.logging.error_log.clone();
    let (app, _state) = app_for(config).await;

    let (status, body) = post_completions(
        app,
        json!({"model": "auto", "messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["choices"][0]["message"]["content"], "beta says hi");
    assert_eq!(body["choices"][0]["message"]["name"], "beta");
    assert_eq!(body["model"], "beta-chat");
    assert_eq!(body["usage"]["prompt_tokens"], 20);

    // Three failed attempts recorded in the error log.
    let content = std::fs::read_to_string(error_log).unwrap();
    assert_eq!(content.lines().count(), 3);
    let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(first["provider"], "alpha");
    assert_eq!(first["rank"], "primary");
    assert!(first["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn auth_failure_advances_without_retries() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;

    // Permanent 401: exactly one attempt, no retry budget spent.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&alpha)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("covered")))
        .expect(1)
        .mount(&beta)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = two_provider_config(&dir, &alpha.uri(), &beta.uri());
    let (app, _state) = app_for(config).await;

    let (status, body) = post_completions(
        app,
        json!({"model": "auto", "messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["choices"][0]["message"]["name"], "beta");
}

#[tokio::test]
async fn exhausted_chain_returns_upstream_error_envelope() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;

    for server in [&alpha, &beta] {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = two_provider_config(&dir, &alpha.uri(), &beta.uri());
    let (app, _state) = app_for(config).await;

    let (status, body) = post_completions(
        app,
        json!({"model": "auto", "messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_exhausted");
    assert_eq!(body["error"]["type"], "server_error");
}

#[tokio::test]
async fn attempts_are_charged_even_when_they_fail() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&alpha)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .mount(&beta)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = two_provider_config(&dir, &alpha.uri(), &beta.uri());
    let (app, state) = app_for(config).await;

    let (status, _) = post_completions(
        app,
        json!({"model": "auto", "messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Alpha was charged for all three failed attempts.
    let snapshot = state.ledger.snapshot();
    let alpha_spend = snapshot.iter().find(|s| s.provider == "alpha").unwrap();
    assert!(alpha_spend.daily_usd > 0.0);
}
