use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use haulway_app::{Destination, Navigator, ResolutionRetry, SessionLifecycleController};
use haulway_infra::{AuthConfig, GoTrueSessionProvider, RoleAssignmentClient};

const REFRESH_TOKEN_VAR: &str = "HAULWAY_REFRESH_TOKEN";

/// Headless stand-in for the UI: logs where it would navigate.
struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, destination: Destination) {
        info!(%destination, "navigate");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    haulway_observability::init();

    let config = AuthConfig::from_env();
    if let Err(e) = config.role_api_base_url() {
        warn!(error = %e, "role selection will fail until configured");
    }

    let http = config.http_client().context("building HTTP client")?;
    let provider = Arc::new(
        GoTrueSessionProvider::new(&config, http.clone()).context("configuring auth provider")?,
    );
    let assignment = RoleAssignmentClient::new(&config, http, provider.clone());

    let controller = SessionLifecycleController::start(
        provider.clone(),
        assignment,
        Arc::new(LoggingNavigator),
        ResolutionRetry::default(),
    );

    if let Ok(refresh_token) = std::env::var(REFRESH_TOKEN_VAR) {
        if let Err(e) = provider.restore_session(refresh_token.trim()).await {
            warn!(error = %e, "could not restore persisted session");
        }
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!(state = ?controller.state(), "shutting down");
    controller.shutdown();
    Ok(())
}
