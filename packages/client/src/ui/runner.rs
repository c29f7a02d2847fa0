//! Console client entry point.

use std::sync::Arc;

use crate::{
    config::SyncConfig,
    domain::{Role, UserId},
    infrastructure::credential::InMemoryCredentialStore,
    realtime::RealtimeCore,
};

use super::session::{ConsoleNavigator, run_session};

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_id: String,
    pub role: String,
    pub token: Option<String>,
    pub config: SyncConfig,
}

/// Run the interactive client until the user quits or is logged out
pub async fn run_client(options: ClientOptions) -> Result<(), Box<dyn std::error::Error>> {
    let identity = UserId::new(options.user_id)?;
    let role = Role::new(options.role)?;
    let credentials = Arc::new(InMemoryCredentialStore::new(options.token));
    let (navigator, logout_rx) = ConsoleNavigator::channel();

    tracing::info!(
        "Connecting to {} as '{}' ({})",
        options.config.server_url,
        identity,
        role
    );

    let core = RealtimeCore::with_network(&options.config, role, credentials, Arc::new(navigator))?;
    run_session(core, identity, logout_rx).await?;

    tracing::info!("Client session ended normally");
    Ok(())
}
