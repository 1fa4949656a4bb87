//! # mcp
//!
//! Model Context Protocol methods over JSON-RPC 2.0:
//! - envelope types and the [`Dispatcher`](rpc::Dispatcher) that never fails
//! - `initialize`, `initialized`, `tools/list` and `tools/call`
//! - the [`Tool`](tool::Tool) seam and the NeonPanel-backed tools
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut tools = ToolRegistry::new();
//! register_neonpanel_tools(&mut tools, NeonPanelClient::new(http, config.neonpanel_api_base()))?;
//! let dispatcher = build_dispatcher(ServerInfo::from(&config), Arc::new(tools));
//! let response = dispatcher.handle(payload, &auth_context).await;
//! ```

pub mod error;
pub mod gateway;
pub mod handlers;
pub mod rpc;
pub mod tool;
pub mod tools;

pub use error::{Error, ErrorKind, GatewayErrorKind};
pub use handlers::{build_dispatcher, ServerInfo};
pub use rpc::{Dispatcher, JsonRpcResponse};
pub use tool::{Tool, ToolRegistry};
