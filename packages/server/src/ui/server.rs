//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc};

use tokio::net::{TcpListener, TcpStream};

use crate::{
    config::ServerConfig,
    domain::{ConnectionId, ConnectionRegistry, ServerError},
    infrastructure::InMemoryConnectionRegistry,
};

use super::{handler::ConnectionHandler, signal::shutdown_signal};

/// Line relay server
///
/// Owns the listening socket and the connection registry shared by every
/// handler it spawns.
///
/// # Example
///
/// ```ignore
/// let server = Server::bind(&ServerConfig::default()).await?;
/// server.run().await?;
/// ```
pub struct Server {
    listener: TcpListener,
    registry: Arc<dyn ConnectionRegistry>,
}

impl Server {
    /// Bind to the configured address with an empty in-memory registry
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::new(listener, Arc::new(InMemoryConnectionRegistry::new())))
    }

    pub fn new(listener: TcpListener, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { listener, registry }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Shared registry handle
    pub fn registry(&self) -> Arc<dyn ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until Ctrl+C
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Every accepted connection gets its own task; the loop never waits on
    /// relay work.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Accept` if accepting fails. The server cannot
    /// do its job without a working listener, so this is not retried.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!("Line relay server listening on {}", self.local_addr()?);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(ServerError::Accept)?;
                    spawn_handler(stream, peer, &self.registry);
                }
            }
        }

        tracing::info!(
            "Server shutdown complete ({} connections open)",
            self.registry.count().await
        );

        Ok(())
    }
}

fn spawn_handler(stream: TcpStream, peer: SocketAddr, registry: &Arc<dyn ConnectionRegistry>) {
    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer, "Failed to set TCP_NODELAY: {}", e);
        }
        let (reader, writer) = stream.into_split();
        let mut handler = ConnectionHandler::new(ConnectionId::generate(), Some(peer), registry);
        let reason = handler.run(reader, writer).await;
        tracing::debug!(peer = %peer, "Handler finished: {:?}", reason);
    });
}
