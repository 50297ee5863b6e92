//! Error types for route selection

use thiserror::Error;

/// Errors that can occur during route selection
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The routing policy table has no row for this intent.
    #[error("No routing policy configured for intent '{intent}'")]
    NoPolicy { intent: String },

    /// No provider/tier combination is within budget for this request.
    #[error("Budget exhausted: no provider within caps for intent '{intent}' at tier '{tier}' or below")]
    BudgetExhausted { intent: String, tier: String },

    /// A verify request could only be routed back to the provider that
    /// produced the original answer.
    #[error("Verify constraint violated: only in-budget provider is the original '{provider}'")]
    VerifyConstraint { provider: String },
}
