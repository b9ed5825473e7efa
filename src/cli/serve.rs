use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::config::{AppConfig, CliOverrides};
use crate::core::dispatch::InngestDispatcher;
use crate::core::lifecycle::LifecycleManager;
use crate::core::requests::AgentRequestService;
use crate::core::store::SqliteRequestStore;
use crate::core::terminal::{print_link, print_success, print_warn};
use crate::interfaces::web::ApiServer;
use crate::logging;

pub async fn run(overrides: CliOverrides) -> Result<()> {
    let config = AppConfig::load(&overrides).await?;
    logging::init(config.log_file.as_deref()).context("Failed to open log file")?;

    for (label, value) in config.summary() {
        info!("{}: {}", label, value);
    }
    if config.uses_default_token() {
        warn!("AGENT_RESULT_TOKEN is not set; callbacks accept the built-in development token");
    }

    let store = Arc::new(SqliteRequestStore::new(&config.storage_path));
    store.init().await?;
    let dispatcher = Arc::new(InngestDispatcher::new(&config.broker)?);
    let service = Arc::new(AgentRequestService::new(
        store,
        dispatcher,
        config.execution_endpoint.clone(),
        config.strict_transitions,
    ));

    let server = Arc::new(Mutex::new(ApiServer::new(
        service,
        &config.callback_token,
        config.server.bind_addr(),
    )));
    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(server.clone());
    lifecycle.start().await?;

    if let Some(addr) = server.lock().await.local_addr() {
        print_success("agent-relay is ready.");
        print_link("API", &format!("http://{}", addr));
    }
    if config.uses_default_token() {
        print_warn("Using the development callback token. Set AGENT_RESULT_TOKEN in production.");
    }

    shutdown_signal().await;
    info!("Shutdown signal received");
    lifecycle.shutdown().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
