use axum::extract::DefaultBodyLimit;
use axum::http::header::{
    ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, WWW_AUTHENTICATE,
};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use log::*;
use service::config::Config;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::controller::{
    discovery_controller, health_check_controller, mcp_controller, sse_controller,
    tools_controller,
};
use crate::error::{Error, ErrorKind};
use crate::middleware::auth::require_bearer;
use crate::middleware::rate_limit::limit_per_client;
use crate::AppState;

const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");
const X_MCP_SESSION_ID: HeaderName = HeaderName::from_static("x-mcp-session-id");

pub fn define_routes(app_state: AppState) -> Router {
    let body_limit = app_state.config.request_body_limit_bytes;
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(discovery_routes(app_state.clone()))
        .merge(rpc_routes(app_state.clone()))
        .merge(sse_routes(app_state.clone()))
        .merge(tool_routes(app_state))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn discovery_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(discovery_controller::server_metadata))
        .route("/mcp/capabilities", get(discovery_controller::capabilities))
        .with_state(app_state)
}

fn rpc_routes(app_state: AppState) -> Router {
    // The per-client quota covers only the POST side of each path.
    let rpc = post(mcp_controller::rpc)
        .route_layer(from_fn_with_state(app_state.clone(), limit_per_client));

    Router::new()
        .route(
            "/mcp",
            rpc.clone().get(discovery_controller::server_metadata),
        )
        .route("/messages", rpc.get(mcp_controller::messages_get))
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse_controller::connect))
        .with_state(app_state)
}

fn tool_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/mcp/tools/call", post(tools_controller::call))
        .route_layer(from_fn_with_state(app_state.clone(), require_bearer))
        .with_state(app_state)
}

async fn not_found() -> Error {
    Error::new(ErrorKind::NotFound)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {origin:?}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            CACHE_CONTROL,
            ACCEPT,
            MCP_SESSION_ID,
            X_MCP_SESSION_ID,
        ])
        .expose_headers([WWW_AUTHENTICATE, MCP_SESSION_ID])
}
