//! # web
//!
//! The HTTP face of the MCP server: JSON-RPC over `POST /mcp` and
//! `POST /messages`, the `GET /sse` push channel, the REST style
//! `POST /mcp/tools/call` wrapper, discovery documents and `GET /healthz`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use auth::TokenValidator;
use log::*;
use mcp::Dispatcher;
use service::config::Config;
use sse::{Manager, SessionRegistry};
use tokio::net::TcpListener;

use crate::middleware::rate_limit::{client_rate_limiter, ClientRateLimiter};

mod classify;
mod controller;
mod delivery;
pub mod error;
mod extractors;
mod middleware;
mod router;

pub use router::define_routes;

/// Everything a request handler needs, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sse_manager: Arc<Manager>,
    pub session_registry: Arc<SessionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub token_validator: Arc<TokenValidator>,
    pub rate_limiter: Arc<ClientRateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        sse_manager: Arc<Manager>,
        session_registry: Arc<SessionRegistry>,
        dispatcher: Arc<Dispatcher>,
        token_validator: Arc<TokenValidator>,
    ) -> Self {
        Self {
            rate_limiter: Arc::new(client_rate_limiter(&config)),
            config: Arc::new(config),
            sse_manager,
            session_registry,
            dispatcher,
            token_validator,
            started_at: Instant::now(),
        }
    }
}

/// Binds the configured interface and serves until `shutdown` resolves.
pub async fn init_server(
    app_state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let host = format!("{interface}:{}", app_state.config.port);

    info!(
        "Starting {} {} on {host} ({} environment)",
        app_state.config.mcp_server_name,
        app_state.config.build_version,
        app_state.config.runtime_env()
    );

    let listener = TcpListener::bind(&host).await?;

    // Forget clients whose quota has fully replenished.
    let limiter = Arc::clone(&app_state.rate_limiter);
    let window = app_state.config.rate_limit_window();
    let pruning = tokio::spawn(async move {
        let mut interval = tokio::time::interval(window);
        loop {
            interval.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    });

    let routes = define_routes(app_state);

    let served = axum::serve(
        listener,
        routes.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    pruning.abort();
    served
}

#[cfg(test)]
pub(crate) mod test_support;
