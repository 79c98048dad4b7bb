//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::BotError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::storage::settings::{Secrets, Settings};

/// Run deploybot until `shutdown_signal` resolves
pub async fn run(
    settings: Settings,
    secrets: Secrets,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BotError> {
    info!("Initializing deploybot...");

    let mut shutdown_manager = ShutdownManager::new(options.lifecycle.clone());

    if let Err(e) = init(&settings, &secrets, &options, &mut shutdown_manager).await {
        error!("Failed to start deploybot: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    settings: &Settings,
    secrets: &Secrets,
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), BotError> {
    let app_state = Arc::new(AppState::init(settings, secrets)?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_socket_server(options, app_state, secrets, shutdown_manager).await
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    secrets: &Secrets,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), BotError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(
        app_state.orchestrator.clone(),
        secrets.slack_signing_secret.clone(),
        app_state.tasks.clone(),
    );

    let shutdown = app_state.shutdown.clone();
    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        shutdown.cancelled().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    socket_server_handle: Option<JoinHandle<Result<(), BotError>>>,
}

impl ShutdownManager {
    pub fn new(lifecycle_options: LifecycleOptions) -> Self {
        Self {
            lifecycle_options,
            app_state: None,
            socket_server_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), BotError> {
        if self.app_state.is_some() {
            return Err(BotError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), BotError>>,
    ) -> Result<(), BotError> {
        if self.socket_server_handle.is_some() {
            return Err(BotError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), BotError> {
        if let Some(state) = &self.app_state {
            state.shutdown.cancel();
        }

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), BotError> {
        info!("Shutting down deploybot...");

        // 1. Socket server stops accepting requests
        if let Some(handle) = self.socket_server_handle.take() {
            handle.await.map_err(|e| BotError::ShutdownError(e.to_string()))??;
        }

        // 2. In-flight deployments
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
