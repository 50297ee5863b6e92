//! Chat completions endpoint: the per-request orchestrator.
//!
//! One strictly sequential pass per inbound request:
//! received → compacting → routing → calling → succeeded | failed.
//! This handler is also the single point where internal error kinds become
//! the OpenAI-compatible wire shape.

use crate::api::types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Usage,
};
use crate::api::AppState;
use crate::fallback::{AttemptOutcome, FallbackError, FallbackOutcome};
use crate::logging::{ContextRecord, ErrorRecord, RequestRecord};
use crate::routing::{Intent, Priority, RouteQuery, RoutingError};
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;

/// POST /v1/chat/completions - Handle a chat completion request.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    // ── Received ─────────────────────────────────────────────────────────
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }
    let metadata = request.metadata.clone().unwrap_or_default();

    let priority = match &metadata.priority {
        Some(p) => p
            .parse::<Priority>()
            .map_err(|e| ApiError::bad_request(&e))?,
        None => state
            .config
            .routing
            .default_priority
            .parse()
            .unwrap_or(Priority::Normal),
    };
    let intent = match &metadata.intent {
        Some(i) => i.parse::<Intent>().map_err(|e| ApiError::bad_request(&e))?,
        None => crate::routing::intent::infer(
            &request.messages,
            &state.config.routing.intent_keywords,
        ),
    };

    // Origin provider for verify: the latest assistant message tagged with
    // a known provider id. Unknown origin routes normally.
    let origin_provider = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "assistant")
        .and_then(|m| m.name.clone())
        .filter(|name| state.registry.provider(name).is_some());

    info!(intent = %intent, priority = %priority, messages = request.messages.len(), "Chat completion request");

    // ── Compacting ───────────────────────────────────────────────────────
    let limits = state.config.tokens.limits_for(priority.as_str());
    let (compacted, stats) = state
        .compactor
        .compact(&request.messages, limits, priority)
        .await;
    state.events.context(&ContextRecord::new(stats.clone())).await;

    let prompt_tokens = stats.tokens_after;
    let completion_tokens = request
        .max_tokens
        .unwrap_or(state.config.tokens.default_completion_tokens);

    // ── Routing ──────────────────────────────────────────────────────────
    let query = RouteQuery {
        intent,
        priority,
        route_override: metadata.route.clone(),
        model_override: metadata.model.clone(),
        origin_provider: origin_provider.clone(),
        prompt_tokens,
        completion_tokens,
    };
    let decision = state.selector.select(&query).map_err(|e| match e {
        RoutingError::BudgetExhausted { .. } => ApiError::budget_exhausted(&e.to_string()),
        RoutingError::VerifyConstraint { .. } => ApiError::verify_constraint(&e.to_string()),
        RoutingError::NoPolicy { .. } => ApiError::bad_request(&e.to_string()),
    })?;
    state
        .events
        .request(&RequestRecord::from_decision(&decision, prompt_tokens))
        .await;

    // ── Calling ──────────────────────────────────────────────────────────
    let result = state
        .fallback
        .execute(
            &decision,
            &compacted,
            request.max_tokens,
            request.temperature,
            prompt_tokens,
            completion_tokens,
            origin_provider.as_deref(),
        )
        .await;

    match result {
        Ok(outcome) => {
            for record in ErrorRecord::from_attempts(&outcome.attempts) {
                state.events.error(&record).await;
            }
            Ok(Json(normalize_response(outcome, prompt_tokens)))
        }
        Err(FallbackError::Exhausted { attempts }) => {
            for record in ErrorRecord::from_attempts(&attempts) {
                state.events.error(&record).await;
            }
            // A chain spent purely on budget refusals is a budget failure,
            // not an upstream one.
            let all_budget = !attempts.is_empty()
                && attempts
                    .iter()
                    .all(|a| matches!(a.outcome, AttemptOutcome::BudgetRefused(_)));
            if all_budget {
                Err(ApiError::budget_exhausted(
                    "No fallback candidate is within budget caps",
                ))
            } else {
                Err(ApiError::upstream_exhausted(
                    "All fallback candidates failed",
                ))
            }
        }
    }
}

/// Shape the provider reply into the OpenAI completion envelope.
///
/// The responding provider is recorded as the assistant message's `name`,
/// which is what later verify requests use to avoid re-asking the author.
fn normalize_response(outcome: FallbackOutcome, estimated_prompt_tokens: u32) -> ChatCompletionResponse {
    let prompt_tokens = if outcome.response.tokens_in > 0 {
        outcome.response.tokens_in
    } else {
        estimated_prompt_tokens
    };
    let completion_tokens = outcome.response.tokens_out;

    let mut message = ChatMessage::assistant(outcome.response.text);
    message.name = Some(outcome.provider);

    ChatCompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: outcome.model,
        choices: vec![Choice {
            index: 0,
            message,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    }
}
