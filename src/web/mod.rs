//! Web server module: the metrics pull endpoint.

mod handlers;

pub use handlers::*;

use axum::{routing::get, Router};
use prometheus::Registry;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
}

/// Metrics exposition server.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(registry: Registry) -> Self {
        Self {
            state: AppState { registry },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        Router::new()
            .route("/metrics", get(handlers::handle_metrics))
            .route("/healthz", get(handlers::handle_healthz))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the listener. Failure here is fatal at startup.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Metrics server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Serve requests on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.routes()).await
    }
}
