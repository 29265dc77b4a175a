//! HTTP server assembly for switchyard

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use switchyard_config::Config;
use switchyard_llm::Gateway;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any provider cannot be initialised
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config.server.listen;

        let gateway = Gateway::new(config.providers)?;
        for name in gateway.provider_names() {
            tracing::info!(provider = %name, "provider ready");
        }

        let router = switchyard_llm::llm_router(Arc::new(gateway)).layer(TraceLayer::new_for_http());

        Ok(Self { router, listen_address })
    }

    /// Replace the configured listen address
    #[must_use]
    pub const fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests until `shutdown` is cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
