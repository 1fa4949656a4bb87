use std::sync::Arc;

use auth::http::{HttpClientBuilder, HttpClientConfig};
use auth::jwks::{JwksCacheConfig, JwksClient};
use auth::validator::TokenValidatorConfig;
use auth::TokenValidator;
use log::*;
use mcp::gateway::NeonPanelClient;
use mcp::tools::register_neonpanel_tools;
use mcp::{build_dispatcher, ServerInfo, ToolRegistry};
use service::{config::Config, logging::Logger};
use sse::{Manager, ManagerConfig, SessionRegistry};
use tokio::signal;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting up {} {}...",
        config.mcp_server_name, config.build_version
    );

    let http = match HttpClientBuilder::with_config(HttpClientConfig::from(&config)).build()
    {
        Ok(http) => http,
        Err(e) => {
            error!("Failed to build outbound HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let jwks = JwksClient::new(
        http.clone(),
        config.neonpanel_oauth_jwks_uri.clone(),
        JwksCacheConfig::from(&config),
    );
    let token_validator = TokenValidator::new(Arc::new(jwks), TokenValidatorConfig::from(&config));

    let mut tools = ToolRegistry::new();
    let neonpanel = NeonPanelClient::new(http, config.neonpanel_api_base());
    if let Err(e) = register_neonpanel_tools(&mut tools, neonpanel) {
        error!("Failed to register tools: {e}");
        std::process::exit(1);
    }
    info!("Registered {} tool(s)", tools.len());

    let dispatcher = build_dispatcher(ServerInfo::from(&config), Arc::new(tools));

    let sse_manager = Arc::new(Manager::new(ManagerConfig {
        heartbeat_interval: config.sse_heartbeat_interval(),
        max_connections: config.sse_max_connections as usize,
        message_endpoint: "/messages".to_string(),
    }));
    let session_registry = Arc::new(SessionRegistry::new());

    let app_state = web::AppState::new(
        config,
        Arc::clone(&sse_manager),
        Arc::clone(&session_registry),
        Arc::new(dispatcher),
        Arc::new(token_validator),
    );

    let shutdown = {
        let sse_manager = Arc::clone(&sse_manager);
        let session_registry = Arc::clone(&session_registry);
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, closing SSE sessions");
            sse_manager.close_all();
            session_registry.terminate_all();
        }
    };

    if let Err(e) = web::init_server(app_state, shutdown).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }

    info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
