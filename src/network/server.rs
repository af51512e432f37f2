//! HTTP Server
//!
//! Serves the engine over HTTP until a shutdown signal arrives.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::engine::Engine;
use crate::error::Result;
use super::router;

/// HTTP server for EmberKV
pub struct HttpServer {
    listen_addr: String,
    engine: Arc<Engine>,
}

impl HttpServer {
    /// Create a new server with the given listen address and engine
    pub fn new(listen_addr: impl Into<String>, engine: Arc<Engine>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            engine,
        }
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        axum::serve(listener, router(self.engine))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
