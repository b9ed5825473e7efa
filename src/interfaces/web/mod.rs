pub(crate) mod auth;
mod error;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::core::lifecycle::LifecycleComponent;
use crate::core::requests::AgentRequestService;

pub(crate) use router::build_api_router;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<AgentRequestService>,
    pub(crate) callback_token: Arc<str>,
}

pub struct ApiServer {
    state: AppState,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(
        service: Arc<AgentRequestService>,
        callback_token: &str,
        bind_addr: impl Into<String>,
    ) -> Self {
        Self {
            state: AppState {
                service,
                callback_token: Arc::from(callback_token),
            },
            bind_addr: bind_addr.into(),
            local_addr: None,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Address actually bound, available once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind API server on {}", self.bind_addr))?;
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);

        let app = build_api_router(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("API Server running at http://{addr}");
        self.handle = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.context("API server task panicked")?;
        }
        Ok(())
    }
}
