pub(crate) mod discovery_controller;
pub(crate) mod health_check_controller;
pub(crate) mod mcp_controller;
pub(crate) mod sse_controller;
pub(crate) mod tools_controller;
