use auth::AuthContext;
use axum::extract::State;
use axum::Json;
use mcp::handlers::TOOLS_LIST;
use mcp::rpc::Outcome;
use serde_json::{json, Value};

use crate::error::{Error, ErrorKind};
use crate::AppState;

/// GET / and GET /mcp
///
/// Static description of the server for clients that look it up before speaking
/// JSON-RPC.
pub(crate) async fn server_metadata(State(app_state): State<AppState>) -> Json<Value> {
    let config = &app_state.config;
    let issuer = config.oauth_issuer();

    Json(json!({
        "name": config.mcp_server_name,
        "version": config.build_version,
        "protocol": config.mcp_protocol_version,
        "description": "NeonPanel MCP Server - Access NeonPanel APIs via Model Context Protocol",
        "endpoints": {
            "health": "/healthz",
            "sse": "/sse",
            "messages": "/messages",
            "mcp": "/mcp",
            "mcp_capabilities": "/mcp/capabilities",
            "mcp_tools_call": "/mcp/tools/call",
        },
        "oauth": {
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/oauth2/authorize"),
            "token_endpoint": format!("{issuer}/oauth2/token"),
            "registration_endpoint": format!("{issuer}/oauth2/register"),
            "required": true,
        },
    }))
}

/// GET /mcp/capabilities
///
/// The `tools/list` catalog reshaped for plain HTTP consumers.
pub(crate) async fn capabilities(State(app_state): State<AppState>) -> Result<Json<Value>, Error> {
    let payload = json!({
        "jsonrpc": "2.0",
        "id": format!("http:{TOOLS_LIST}"),
        "method": TOOLS_LIST,
    });

    let result = match app_state
        .dispatcher
        .handle(payload, &AuthContext::anonymous())
        .await
        .outcome
    {
        Outcome::Result(result) => result,
        Outcome::Error(error) => {
            return Err(Error::new(ErrorKind::PublicRpcFailed(TOOLS_LIST, error)))
        }
    };

    let capabilities: Vec<Value> = result["tools"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|tool| {
            json!({
                "capability_name": tool["name"],
                "description": tool["description"],
                "input_schema": tool["inputSchema"],
                "output_schema": tool.get("outputSchema"),
                "examples": tool.get("examples").cloned().unwrap_or_else(|| json!([])),
            })
        })
        .collect();

    Ok(Json(json!({
        "total": capabilities.len(),
        "capabilities": capabilities,
    })))
}
