//! Request and response types for the OpenAI-compatible API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Literal content prefix marking a message that must survive compaction.
pub const PIN_MARKER: &str = "[PIN]";

/// Chat completion request matching OpenAI format, extended with optional
/// routing metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
    /// Tolerate additional OpenAI fields without failing deserialization
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Routing hints carried alongside a request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestMetadata {
    /// chat | code | reasoning | vision | verify
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// low | normal | high
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Explicit provider override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Explicit model id override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// Optional author tag. An assistant message named after a known
    /// provider records which upstream produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }

    /// Whether the content carries the pin marker.
    pub fn is_pinned(&self) -> bool {
        self.content.trim_start().starts_with(PIN_MARKER)
    }
}

/// Chat completion response (non-streaming).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

/// A single choice in the response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// API error response in OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "invalid_request_error".to_string(),
                param: None,
                code: Some("invalid_request_error".to_string()),
            },
        }
    }

    /// Create a budget exhaustion error (429).
    pub fn budget_exhausted(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "insufficient_quota".to_string(),
                param: None,
                code: Some("budget_exhausted".to_string()),
            },
        }
    }

    /// Create a verify-constraint error (409): the request demanded a
    /// provider distinct from the original answer's, and none is in budget.
    pub fn verify_constraint(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "invalid_request_error".to_string(),
                param: None,
                code: Some("verify_constraint".to_string()),
            },
        }
    }

    /// Create an upstream exhaustion error (502): every fallback candidate
    /// failed.
    pub fn upstream_exhausted(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "server_error".to_string(),
                param: None,
                code: Some("upstream_exhausted".to_string()),
            },
        }
    }

    /// Create an internal error (500).
    pub fn internal(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "server_error".to_string(),
                param: None,
                code: Some("internal_error".to_string()),
            },
        }
    }

    /// Get the HTTP status code for this error.
    fn status_code(&self) -> StatusCode {
        match self.error.code.as_deref() {
            Some("invalid_request_error") => StatusCode::BAD_REQUEST,
            Some("budget_exhausted") => StatusCode::TOO_MANY_REQUESTS,
            Some("verify_constraint") => StatusCode::CONFLICT,
            Some("upstream_exhausted") => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
