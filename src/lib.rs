//! Switchboard - local LLM request router
//!
//! This library provides the core functionality for routing chat-completion
//! requests across heterogeneous upstream providers: intent-based route
//! selection, per-provider budget enforcement with fallback, and
//! context-window compaction with pinning and summarization.

pub mod api;
pub mod budget;
pub mod cli;
pub mod config;
pub mod context;
pub mod estimate;
pub mod fallback;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod routing;
