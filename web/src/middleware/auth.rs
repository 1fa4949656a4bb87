use auth::challenge::{AuthChallenge, RequestOrigin};
use auth::{AuthContext, TokenValidationError};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use mcp::rpc::RequestId;
use serde_json::json;

use crate::error::Error;
use crate::extractors::BearerCredentials;
use crate::AppState;

/// A request whose credentials did not pass, with the challenge to send back.
#[derive(Debug)]
pub(crate) struct AuthRejection {
    pub error: TokenValidationError,
    pub challenge: AuthChallenge,
}

impl AuthRejection {
    /// The JSON-RPC flavored 401: a result carrying the challenge under
    /// `_meta` for clients that only read the payload, plus the real header
    /// for clients that only read HTTP.
    pub fn into_rpc_response(self, id: Option<RequestId>) -> Response {
        let header_value = self.challenge.header_value();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "content": [{
                    "type": "text",
                    "text": format!("Authentication required: {}", self.challenge.description()),
                }],
                "isError": true,
                "_meta": { "mcp/www_authenticate": [header_value] },
            }
        });

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&header_value) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

impl From<AuthRejection> for Error {
    fn from(rejection: AuthRejection) -> Self {
        Error::unauthorized(rejection.error, &rejection.challenge)
    }
}

pub(crate) fn challenge(
    app_state: &AppState,
    origin: &RequestOrigin,
    error: &TokenValidationError,
) -> AuthChallenge {
    AuthChallenge::new(app_state.config.mcp_server_name.clone(), origin)
        .with_scope(app_state.config.challenge_scope())
        .with_error(error)
}

/// Validates the request's bearer token. A missing token is a rejection too.
pub(crate) async fn authenticate(
    app_state: &AppState,
    credentials: &BearerCredentials,
) -> Result<AuthContext, AuthRejection> {
    let result = match credentials.token.as_deref() {
        Some(token) => app_state.token_validator.validate(token).await,
        None => Err(TokenValidationError::missing_token()),
    };

    match result {
        Ok(validated) => Ok(AuthContext::from(validated)),
        Err(error) => {
            warn!("Access token validation failed: {error}");
            Err(AuthRejection {
                challenge: challenge(app_state, &credentials.origin, &error),
                error,
            })
        }
    }
}

/// Route layer that lets only requests with a valid bearer token through,
/// handing the resulting [`AuthContext`] to the handler as an extension.
pub(crate) async fn require_bearer(
    State(app_state): State<AppState>,
    credentials: BearerCredentials,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&app_state, &credentials).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(rejection) => Error::from(rejection).into_response(),
    }
}
