//! Error types for upstream provider calls.

use thiserror::Error;

/// Errors returned by a provider client.
///
/// The transient/permanent split drives the fallback controller's retry
/// policy: transient failures consume the per-candidate retry budget,
/// permanent ones advance the chain immediately.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Upstream returned an error response.
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Missing or rejected credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Upstream response doesn't match the expected completion shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client-side configuration problem (bad base URL, missing key env).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Whether retrying the same candidate could plausibly succeed.
    ///
    /// Network failures, timeouts, 5xx and 429 are transient; everything
    /// else (validation 4xx, auth, malformed responses) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout(_) => true,
            ProviderError::Upstream { status, .. } => *status >= 500 || *status == 429,
            ProviderError::Auth(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::Configuration(_) => false,
        }
    }

    /// One-line description safe for logs: no upstream bodies, no secrets.
    pub fn sanitized(&self) -> String {
        let mut text = match self {
            ProviderError::Upstream { status, .. } => format!("upstream HTTP {}", status),
            other => other.to_string(),
        };
        text.retain(|c| c != '\n' && c != '\r');
        text.truncate(200);
        text
    }
}
