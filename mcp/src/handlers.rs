//! MCP methods served by the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthContext;
use log::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::rpc::{Dispatcher, MethodHandler, RpcError};
use crate::tool::{unwrap_tool_arguments, ToolContext, ToolRegistry};

pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "initialized";
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";

/// Identity reported by `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl From<&service::config::Config> for ServerInfo {
    fn from(config: &service::config::Config) -> Self {
        Self {
            name: config.mcp_server_name.clone(),
            version: config.build_version.clone(),
            protocol_version: config.mcp_protocol_version.clone(),
        }
    }
}

/// Builds a dispatcher with every MCP method registered.
pub fn build_dispatcher(info: ServerInfo, tools: Arc<ToolRegistry>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(INITIALIZE, Initialize { info });
    dispatcher.register(INITIALIZED, Initialized);
    dispatcher.register(
        TOOLS_LIST,
        ListTools {
            tools: Arc::clone(&tools),
        },
    );
    dispatcher.register(TOOLS_CALL, CallTool { tools });
    dispatcher
}

struct Initialize {
    info: ServerInfo,
}

#[async_trait]
impl MethodHandler for Initialize {
    async fn handle(&self, _params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
        Ok(json!({
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            },
            "protocolVersion": self.info.protocol_version,
            "capabilities": {
                "tools": { "listChanged": false }
            }
        }))
    }
}

struct Initialized;

#[async_trait]
impl MethodHandler for Initialized {
    async fn handle(&self, _params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
        Ok(json!({}))
    }
}

struct ListTools {
    tools: Arc<ToolRegistry>,
}

#[async_trait]
impl MethodHandler for ListTools {
    async fn handle(&self, params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
        match params {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(_) => return Err(RpcError::invalid_params("tools/list params must be an object")),
        }

        let tools = serde_json::to_value(self.tools.list()).map_err(RpcError::internal)?;
        Ok(json!({ "tools": tools }))
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

impl CallToolParams {
    fn parse(params: Option<Value>) -> Result<Self, RpcError> {
        let params = params.ok_or_else(|| RpcError::invalid_params("tools/call requires params"))?;
        let parsed: CallToolParams = serde_json::from_value(params)
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;
        if parsed.name.trim().is_empty() {
            return Err(RpcError::invalid_params("tool name must be a non-empty string"));
        }
        Ok(parsed)
    }
}

struct CallTool {
    tools: Arc<ToolRegistry>,
}

#[async_trait]
impl MethodHandler for CallTool {
    async fn handle(&self, params: Option<Value>, ctx: &AuthContext) -> Result<Value, RpcError> {
        let CallToolParams { name, arguments } = CallToolParams::parse(params)?;

        let Some(tool) = self.tools.get(&name) else {
            warn!("tools/call for unknown tool {name}");
            return Ok(tool_error_result(&format!("Unknown tool: {name}")));
        };

        let tool_ctx = ToolContext { auth: ctx.clone() };
        let args = unwrap_tool_arguments(arguments);

        match tool.execute(args, &tool_ctx).await {
            Ok(output) => tool_success_result(output),
            Err(err) => {
                warn!("Tool {name} failed: {err}");
                Ok(tool_error_result(&err.to_string()))
            }
        }
    }
}

fn tool_success_result(output: Value) -> Result<Value, RpcError> {
    let text = serde_json::to_string_pretty(&output).map_err(RpcError::internal)?;
    let mut result = json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false,
    });
    if output.is_object() {
        result["structuredContent"] = output;
    }
    Ok(result)
}

/// The `tools/call` result shape for a failed tool: a successful RPC result
/// the caller recognizes by `isError`.
pub fn tool_error_result(message: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": format!("Error: {message}") }],
        "isError": true,
    })
}
