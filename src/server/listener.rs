//! Traffic server listener
//!
//! Binds the HTTP listener of one node session and serves the stream and
//! control endpoints until shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::handlers::{self, AppState};
use crate::session::{NodeLauncher, NodeSession};

/// HTTP front end of one node session
pub struct TrafficServer<L: NodeLauncher> {
    config: Arc<ServerConfig>,
    session: Arc<NodeSession<L>>,
    shutdown: CancellationToken,
}

impl<L: NodeLauncher> TrafficServer<L> {
    /// Create a new server for `session`
    pub fn new(config: ServerConfig, session: Arc<NodeSession<L>>) -> Self {
        Self {
            config: Arc::new(config),
            session,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get a reference to the node session
    pub fn session(&self) -> &Arc<NodeSession<L>> {
        &self.session
    }

    /// Router serving this session's endpoints
    pub fn router(&self) -> Router {
        handlers::router(AppState {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
        })
    }

    /// Run the server
    ///
    /// This method blocks until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        let serve = self.serve(listener);
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => return result,
            _ = shutdown => {
                tracing::info!(node = %self.session.address(), "Shutdown signal received");
                self.shutdown();
            }
        }

        serve.await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, node = %self.session.address(), "Traffic server listening");

        let token = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        tracing::info!(addr = %addr, "Traffic server stopped");
        Ok(())
    }

    /// Close every open stream and stop accepting requests
    ///
    /// A server that was shut down cannot be run again.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
