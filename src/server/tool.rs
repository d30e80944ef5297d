//! Tool process lifecycle.
//!
//! Wires the configured components into an [`AppState`], binds the listener,
//! spawns the nonce sweeper and serves until ctrl-c or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use url::Url;

use super::router::{AppState, create_router};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::oidc::{
    InMemoryNonceStore, KeyResolver, LaunchValidator, LoginInitiator, NonceStore, spawn_sweeper,
};
use crate::registry::{ConfigRegistry, SharedRegistry};

/// The running LTI tool service.
pub struct Tool {
    config: Config,
}

impl Tool {
    /// Create a tool from validated configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Serve until shutdown.
    ///
    /// # Errors
    ///
    /// Fails on unparseable host/public URL, a bind failure, or a fatal
    /// serve error.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("invalid host: {e}")))?,
            self.config.server.port,
        );
        let public_url = Url::parse(&self.config.server.public_url)
            .map_err(|e| Error::Config(format!("invalid public_url: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(self.config.http.timeout)
            .https_only(self.config.http.https_only)
            .build()?;

        let registry: SharedRegistry = Arc::new(ConfigRegistry::from_config(&self.config));
        let nonces: Arc<dyn NonceStore> =
            Arc::new(InMemoryNonceStore::new(self.config.nonces.ttl));
        let keys = Arc::new(KeyResolver::new(http.clone(), self.config.jwks_cache.ttl));

        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
        spawn_sweeper(
            Arc::clone(&nonces),
            self.config.nonces.sweep_interval,
            shutdown_tx.subscribe(),
        );

        let state = Arc::new(AppState {
            public_url: public_url.clone(),
            registry: Arc::clone(&registry),
            login: LoginInitiator::new(
                Arc::clone(&registry),
                Arc::clone(&nonces),
                http.clone(),
                public_url.clone(),
            ),
            launch: LaunchValidator::new(Arc::clone(&registry), nonces, keys),
        });

        let app = create_router(state);
        let listener = TcpListener::bind(addr).await?;

        let platforms = registry.all().await;
        let base = public_url.as_str().trim_end_matches('/').to_string();
        info!("============================================================");
        info!("LTI TOOL v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = self.config.server.port, "Listening");
        info!(platforms = platforms.len(), "Platforms registered");
        for platform in &platforms {
            info!(
                "  {} ({}) issuer={}",
                platform.platform_id, platform.name, platform.issuer
            );
        }
        info!("Login initiation: {base}/oidc-login");
        info!("Launch endpoint:  {base}/tool");
        info!("Tool JWKS:        {base}/.well-known/jwks.json");
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_tx))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Resolves when ctrl-c or SIGTERM arrives, after signalling background
/// tasks through the broadcast channel.
async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
