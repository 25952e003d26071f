//! CLI command implementations.

use anyhow::{Context, Result};
use tracing::{info, warn};

use sovereign::auth::CredentialStore;
use sovereign::client::AssistantClient;
use sovereign::config::Config;
use sovereign::session::SessionController;

pub mod ask;
pub mod chat;
mod interactive;
pub mod login;
mod render;

/// Load config and build a session controller for the backend.
///
/// An unhealthy or unreachable backend is only a warning here: the first
/// exchange reports the failure in the conversation itself.
pub async fn connect(
    config_path: &str,
    server_url: Option<&str>,
) -> Result<SessionController<AssistantClient>> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("Failed to load config '{}'", config_path))?;

    let url = server_url.unwrap_or(&config.server.url);
    let client = AssistantClient::new(url);

    match client.health().await {
        Ok(health) if health.is_healthy() => info!(url = %client.base_url(), "backend is healthy"),
        Ok(health) => warn!(url = %client.base_url(), status = %health.status, "backend reports degraded health"),
        Err(e) => warn!(url = %client.base_url(), error = %e, "backend health check failed"),
    }

    let credentials = open_credentials(&config)?;
    Ok(SessionController::new(
        client,
        credentials,
        config.stream.settings(),
    ))
}

pub fn open_credentials(config: &Config) -> Result<CredentialStore> {
    let path = config.credentials_path();
    CredentialStore::open(&path)
        .with_context(|| format!("Failed to open credentials at {}", path.display()))
}
