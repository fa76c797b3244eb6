//! Shutdown signal handling.

/// Resolves when Ctrl+C is received.
///
/// If the handler cannot be installed the future never resolves, so the
/// server keeps running until it is killed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
