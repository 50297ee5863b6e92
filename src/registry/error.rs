//! Error types for provider registry construction

use thiserror::Error;

/// Errors raised while building the provider registry from configuration.
///
/// All of these are startup failures: the registry is immutable after load,
/// so a malformed table must stop the process before it serves traffic.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The routing policy names a provider that has no `[providers.*]` entry.
    #[error("Routing policy references unknown provider '{provider}' (intent '{intent}')")]
    UnknownProvider { provider: String, intent: String },

    /// A tier required by the routing policy exists on none of its providers.
    #[error("Tier '{tier}' for intent '{intent}' is not configured on any listed provider")]
    UnroutableTier { tier: String, intent: String },

    /// A tier entry is missing its model identifier.
    #[error("Provider '{provider}' tier '{tier}' has an empty model id")]
    MissingModel { provider: String, tier: String },

    /// A tier entry carries a negative cost rate.
    #[error("Provider '{provider}' tier '{tier}' has a negative cost rate")]
    InvalidRate { provider: String, tier: String },

    /// No providers are configured at all.
    #[error("No providers configured")]
    Empty,
}
