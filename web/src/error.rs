use std::error::Error as StdError;

use auth::challenge::AuthChallenge;
use auth::TokenValidationError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use mcp::rpc::ErrorObject;
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// Bearer token missing or rejected. Carries the rendered
    /// `WWW-Authenticate` value.
    Unauthorized {
        code: &'static str,
        message: String,
        challenge: String,
    },
    SseUnavailable,
    ToolCallFailed(ErrorObject),
    /// A method served over plain HTTP answered with a JSON-RPC error.
    PublicRpcFailed(&'static str, ErrorObject),
    MethodNotAllowed(&'static str),
    NotFound,
    /// Per-client quota exhausted; retry after this many seconds.
    RateLimited(u64),
}

impl Error {
    pub fn unauthorized(err: TokenValidationError, challenge: &AuthChallenge) -> Self {
        Self {
            error_kind: ErrorKind::Unauthorized {
                code: err.code(),
                message: err.message().to_string(),
                challenge: challenge.header_value(),
            },
            source: Some(Box::new(err)),
        }
    }

    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    fn status(&self) -> StatusCode {
        match &self.error_kind {
            ErrorKind::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ErrorKind::SseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ToolCallFailed(_) => StatusCode::BAD_REQUEST,
            ErrorKind::PublicRpcFailed(..) => StatusCode::BAD_GATEWAY,
            ErrorKind::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn code(&self) -> &'static str {
        match &self.error_kind {
            ErrorKind::Unauthorized { code, .. } => code,
            ErrorKind::SseUnavailable => "sse_unavailable",
            ErrorKind::ToolCallFailed(_) => "tool_call_failed",
            ErrorKind::PublicRpcFailed(..) => "rpc_error",
            ErrorKind::MethodNotAllowed(_) => "method_not_allowed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited(_) => "rate_limit_exceeded",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.error_kind {
            ErrorKind::Unauthorized { message, .. } => write!(f, "{message}"),
            ErrorKind::SseUnavailable => write!(f, "Maximum number of SSE connections reached."),
            ErrorKind::ToolCallFailed(error) => write!(f, "{}", error.message),
            ErrorKind::PublicRpcFailed(method, _) => {
                write!(f, "Failed to call public RPC method: {method}")
            }
            ErrorKind::MethodNotAllowed(allowed) => {
                write!(f, "Only {allowed} method is allowed for this endpoint.")
            }
            ErrorKind::NotFound => write!(f, "Endpoint not found."),
            ErrorKind::RateLimited(_) => write!(f, "Too many requests. Please retry shortly."),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<sse::Error> for Error {
    fn from(err: sse::Error) -> Self {
        Self {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::SseUnavailable,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "status": status.as_u16(),
            "code": self.code(),
            "message": self.to_string(),
        });

        match &self.error_kind {
            ErrorKind::ToolCallFailed(error) | ErrorKind::PublicRpcFailed(_, error) => {
                body["details"] = json!(error);
            }
            ErrorKind::SseUnavailable => {
                warn!("Failed to establish SSE session: {:?}", self.source);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        match &self.error_kind {
            ErrorKind::Unauthorized { challenge, .. } => match HeaderValue::from_str(challenge) {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                Err(err) => error!("Unable to encode WWW-Authenticate header: {err}"),
            },
            ErrorKind::RateLimited(retry_after) => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            _ => {}
        }
        response
    }
}
