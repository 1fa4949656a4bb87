use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::AppState;

fn wants_deep_check(query: Option<&str>) -> bool {
    form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .any(|(key, value)| key == "deep" && (value == "1" || value == "true"))
}

/// GET /healthz
///
/// `?deep=1` (or `true`) also checks that the signing key set is reachable.
pub(crate) async fn health_check(
    State(app_state): State<AppState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let mut body = json!({
        "status": "ok",
        "service": app_state.config.mcp_server_name,
        "version": app_state.config.build_version,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "uptimeSeconds": app_state.started_at.elapsed().as_secs(),
        "sse": {
            "activeConnections": app_state.sse_manager.active_connections(),
            "registeredSessions": app_state.session_registry.len(),
        },
    });

    if wants_deep_check(query.as_deref()) {
        body["jwks"] = json!(app_state.token_validator.key_set_status().await);
    }

    Json(body)
}
