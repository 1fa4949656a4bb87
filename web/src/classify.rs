//! Which JSON-RPC calls may run without a bearer token.

use mcp::handlers::{INITIALIZE, INITIALIZED, TOOLS_LIST};
use serde_json::Value;

/// Discovery methods a client may call before it has linked an account.
pub(crate) const PUBLIC_METHODS: [&str; 3] = [INITIALIZE, INITIALIZED, TOOLS_LIST];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Public,
    Protected,
}

/// A call is public only when it names a discovery method *and* carries no
/// usable bearer token. A present token is always validated, and anything
/// that is not a recognizable discovery call requires one.
pub(crate) fn classify(payload: &Value, has_bearer: bool) -> Access {
    if has_bearer {
        return Access::Protected;
    }

    match payload.get("method").and_then(Value::as_str) {
        Some(method) if PUBLIC_METHODS.contains(&method) => Access::Public,
        _ => Access::Protected,
    }
}
