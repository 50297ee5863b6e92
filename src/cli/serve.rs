//! `switchboard serve` - start the router.

use super::ServeArgs;
use crate::api::{create_router, AppState};
use crate::config::SwitchboardConfig;
use crate::logging::init_tracing;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = SwitchboardConfig::load(args.config.as_deref())
        .context("loading configuration")?
        .with_env_overrides();
    config.validate().context("validating configuration")?;

    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::from_config(config).await?);

    info!(
        providers = state.registry.enabled_providers().count(),
        addr = %addr,
        "Starting switchboard"
    );

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}
