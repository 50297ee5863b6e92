//! Approximate token and cost estimation.
//!
//! Everything here is a pure function: the rest of the router treats these
//! figures as upper-bound estimates for budget checks and context trimming,
//! never as billing truth.

use crate::api::types::ChatMessage;
use crate::registry::ModelSpec;

/// Default safety margin applied on top of the chars/4 heuristic, in percent.
pub const DEFAULT_MARGIN_PERCENT: u8 = 10;

/// Estimate the token count of a piece of text.
///
/// Heuristic: 1 token ≈ 4 characters, rounded up, then inflated by the
/// safety margin so downstream caps are checked conservatively.
pub fn approx_tokens(text: &str, margin_percent: u8) -> u32 {
    let base = text.len().div_ceil(4) as u64;
    let with_margin = (base * (100 + margin_percent as u64)).div_ceil(100);
    with_margin.min(u32::MAX as u64) as u32
}

/// Estimate the combined token count of a message list.
pub fn approx_message_tokens(messages: &[ChatMessage], margin_percent: u8) -> u32 {
    messages
        .iter()
        .map(|m| approx_tokens(&m.content, margin_percent))
        .fold(0u32, u32::saturating_add)
}

/// Approximate USD cost for a token split at a model's per-million rates.
pub fn cost_usd(tokens_in: u32, tokens_out: u32, spec: &ModelSpec) -> f64 {
    (spec.input_cost_per_million * tokens_in as f64
        + spec.output_cost_per_million * tokens_out as f64)
        / 1_000_000.0
}
