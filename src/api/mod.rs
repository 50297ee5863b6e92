//! # OpenAI-compatible HTTP surface
//!
//! Endpoints:
//!
//! - `POST /v1/chat/completions` - routed, budget-enforced chat completion
//! - `GET /health` - status plus per-provider spend estimates
//!
//! All errors leave in the OpenAI error envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "Budget exhausted: ...",
//!     "type": "insufficient_quota",
//!     "code": "budget_exhausted"
//!   }
//! }
//! ```

mod completions;
mod health;
pub mod types;

pub use types::*;

use crate::budget::BudgetLedger;
use crate::config::SwitchboardConfig;
use crate::context::{Compactor, PinStore, SummaryJournal, Summarizer, TierSummarizer};
use crate::fallback::FallbackController;
use crate::logging::EventLog;
use crate::provider::{build_clients, ProviderClient};
use crate::registry::ProviderRegistry;
use crate::routing::RouteSelector;
use axum::{
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<SwitchboardConfig>,
    pub registry: Arc<ProviderRegistry>,
    pub ledger: Arc<BudgetLedger>,
    pub selector: RouteSelector,
    pub fallback: FallbackController,
    pub compactor: Compactor,
    pub events: EventLog,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the full state from validated configuration.
    ///
    /// Builds the registry (fail-fast), provider clients, durable stores
    /// and the three router subsystems.
    pub async fn from_config(config: SwitchboardConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(ProviderRegistry::from_config(&config)?);

        let http = Arc::new(
            reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .build()?,
        );
        let call_timeout = Duration::from_secs(config.server.request_timeout_seconds);
        let clients = build_clients(&registry, http, call_timeout);

        let ledger = Arc::new(BudgetLedger::new(config.budget.clone()));
        let summarizer: Arc<dyn Summarizer> = Arc::new(TierSummarizer::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            clients.clone(),
            config.tokens.safety_margin_percent,
        ));
        let pins = Arc::new(PinStore::load(&config.context.pins_file).await?);

        Ok(Self::assemble(
            config, registry, ledger, clients, summarizer, pins,
        ))
    }

    /// Assemble state from pre-built parts. Tests use this to swap in stub
    /// clients and summarizers.
    pub fn assemble(
        config: Arc<SwitchboardConfig>,
        registry: Arc<ProviderRegistry>,
        ledger: Arc<BudgetLedger>,
        clients: HashMap<String, Arc<dyn ProviderClient>>,
        summarizer: Arc<dyn Summarizer>,
        pins: Arc<PinStore>,
    ) -> Self {
        let journal = Arc::new(SummaryJournal::new(&config.context.summaries_dir));
        let compactor = Compactor::new(
            config.context.clone(),
            config.tokens.clone(),
            pins,
            journal,
            summarizer,
        );
        let selector = RouteSelector::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            config.routing.clone(),
        );
        let fallback = FallbackController::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            clients,
            config.routing.clone(),
        );
        let events = EventLog::new(&config.logging);

        Self {
            config,
            registry,
            ledger,
            selector,
            fallback,
            compactor,
            events,
            start_time: Instant::now(),
        }
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_seconds);
    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .route("/v1/chat/completions", post(completions::handle))
        .route("/health", get(health::handle))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
