use auth::AuthContext;
use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use mcp::handlers::TOOLS_CALL;
use mcp::rpc::Outcome;
use serde_json::{json, Value};

use crate::error::{Error, ErrorKind};
use crate::AppState;

/// POST /mcp/tools/call
///
/// REST style `tools/call`: the body is the call's params and the reply is the
/// bare result. Runs behind `require_bearer`.
pub(crate) async fn call(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> Result<Json<Value>, Error> {
    let params: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let id = params.get("id").cloned().unwrap_or(Value::Null);

    let payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": TOOLS_CALL,
        "params": params,
    });

    match app_state.dispatcher.handle(payload, &ctx).await.outcome {
        Outcome::Result(result) => Ok(Json(result)),
        Outcome::Error(error) => Err(Error::new(ErrorKind::ToolCallFailed(error))),
    }
}
