use auth::AuthContext;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use mcp::rpc::RequestId;
use mcp::Dispatcher;
use serde_json::Value;

use crate::classify::{classify, Access};
use crate::delivery::{deliver, Sinks};
use crate::error::{Error, ErrorKind};
use crate::extractors::{BearerCredentials, ExplicitSessionId};
use crate::middleware::auth::authenticate;
use crate::AppState;

/// POST /mcp and POST /messages
///
/// Public discovery calls run anonymously; everything else needs a valid
/// bearer token. The result is always returned inline and additionally
/// pushed to the caller's SSE stream(s).
pub(crate) async fn rpc(
    State(app_state): State<AppState>,
    credentials: BearerCredentials,
    ExplicitSessionId(explicit): ExplicitSessionId,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Rejecting JSON-RPC body that is not JSON: {err}");
            return Json(Dispatcher::parse_error(err.to_string())).into_response();
        }
    };
    let method = payload
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let ctx = match classify(&payload, credentials.token.is_some()) {
        Access::Public => {
            info!("Handling public JSON-RPC request {method}");
            AuthContext::anonymous()
        }
        Access::Protected => match authenticate(&app_state, &credentials).await {
            Ok(ctx) => {
                info!(
                    "Handling authenticated JSON-RPC request {method} (subject {:?})",
                    ctx.subject()
                );
                ctx
            }
            Err(rejection) => return rejection.into_rpc_response(request_id(&payload)),
        },
    };

    let response = app_state.dispatcher.handle(payload, &ctx).await;

    deliver(
        &response,
        &Sinks {
            manager: &app_state.sse_manager,
            registry: &app_state.session_registry,
            explicit: explicit.as_ref(),
            auth: &ctx,
        },
    );

    Json(response).into_response()
}

/// GET /messages
pub(crate) async fn messages_get() -> Error {
    Error::new(ErrorKind::MethodNotAllowed("POST"))
}

fn request_id(payload: &Value) -> Option<RequestId> {
    payload
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value(id).ok())
}
