use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sse::SessionId;

const SESSION_PARAMS: [&str; 2] = ["sessionId", "session_id"];
const SESSION_HEADERS: [&str; 2] = ["x-mcp-session-id", "mcp-session-id"];

/// Session id the caller named for delivery, from `?sessionId=`,
/// `?session_id=` or an MCP session header, in that order. A repeated query
/// key yields its first non-blank value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExplicitSessionId(pub Option<SessionId>);

fn non_blank(value: Option<&str>) -> Option<SessionId> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(SessionId::from)
}

impl<S> FromRequestParts<S> for ExplicitSessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let from_query = SESSION_PARAMS.iter().find_map(|param| {
            form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == *param)
                .find_map(|(_, value)| non_blank(Some(value.as_ref())))
        });
        if from_query.is_some() {
            return Ok(Self(from_query));
        }

        let from_header = SESSION_HEADERS.iter().find_map(|name| {
            non_blank(parts.headers.get(*name).and_then(|value| value.to_str().ok()))
        });
        Ok(Self(from_header))
    }
}
