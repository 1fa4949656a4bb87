use std::convert::Infallible;

use auth::bearer::extract_bearer;
use auth::challenge::RequestOrigin;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// The usable bearer token of a request, if any, plus where the request was
/// addressed to (for building challenges). Never rejects.
#[derive(Debug, Clone)]
pub(crate) struct BearerCredentials {
    pub token: Option<String>,
    pub origin: RequestOrigin,
}

impl BearerCredentials {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

        Self {
            token: extract_bearer(header(AUTHORIZATION.as_str())).map(str::to_string),
            origin: RequestOrigin::from_headers(
                header("x-forwarded-proto"),
                header("x-forwarded-host"),
                header(HOST.as_str()),
            ),
        }
    }
}

impl<S> FromRequestParts<S> for BearerCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_usable_bearer_is_extracted() {
        let credentials =
            BearerCredentials::from_headers(&headers(&[("authorization", "bearer abc.def")]));
        assert_eq!(credentials.token.as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_empty_or_malformed_header_is_not_usable() {
        for value in ["", "Bearer", "Bearer   ", "Basic dXNlcjpwYXNz", "Token abc"] {
            let credentials = BearerCredentials::from_headers(&headers(&[("authorization", value)]));
            assert!(credentials.token.is_none(), "{value:?} should not be usable");
        }
    }

    #[test]
    fn test_origin_prefers_forwarded_headers() {
        let credentials = BearerCredentials::from_headers(&headers(&[
            ("host", "10.0.0.4:3000"),
            ("x-forwarded-host", "mcp.neonpanel.com"),
        ]));
        assert_eq!(
            credentials.origin.resource().as_deref(),
            Some("https://mcp.neonpanel.com")
        );
    }
}
