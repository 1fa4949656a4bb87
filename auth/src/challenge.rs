//! `WWW-Authenticate` challenges for rejected requests.

use crate::error::TokenValidationError;

/// Where the client reached us, as seen through any proxies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub proto: String,
    pub host: Option<String>,
}

impl RequestOrigin {
    /// Prefers `X-Forwarded-Proto`/`X-Forwarded-Host` over `Host`. Only the
    /// first entry of a comma separated forwarded list is used; the protocol
    /// defaults to `https`.
    pub fn from_headers(
        forwarded_proto: Option<&str>,
        forwarded_host: Option<&str>,
        host: Option<&str>,
    ) -> Self {
        let first = |value: Option<&str>| {
            value
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            proto: first(forwarded_proto).unwrap_or_else(|| "https".to_string()),
            host: first(forwarded_host).or_else(|| first(host)),
        }
    }

    pub fn resource(&self) -> Option<String> {
        self.host
            .as_ref()
            .map(|host| format!("{}://{}", self.proto, host))
    }

    pub fn resource_metadata(&self) -> Option<String> {
        self.resource()
            .map(|resource| format!("{resource}/.well-known/oauth-protected-resource"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthChallenge {
    realm: String,
    resource: Option<String>,
    resource_metadata: Option<String>,
    scope: Option<String>,
    error: String,
    error_description: String,
}

impl AuthChallenge {
    pub fn new(realm: impl Into<String>, origin: &RequestOrigin) -> Self {
        Self {
            realm: realm.into(),
            resource: origin.resource(),
            resource_metadata: origin.resource_metadata(),
            scope: None,
            error: "invalid_token".to_string(),
            error_description: "Authorization: Bearer token is required.".to_string(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        self.scope = (!scope.is_empty()).then_some(scope);
        self
    }

    pub fn with_error(mut self, error: &TokenValidationError) -> Self {
        self.error = error.challenge_error().to_string();
        self.error_description = error.message().to_string();
        self
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn description(&self) -> &str {
        &self.error_description
    }

    /// Renders the header value. Double quotes inside values become single
    /// quotes so the quoted-string parameters stay well formed.
    pub fn header_value(&self) -> String {
        let mut params = vec![("realm", self.realm.as_str())];
        if let Some(resource) = &self.resource {
            params.push(("resource", resource));
        }
        if let Some(metadata) = &self.resource_metadata {
            params.push(("resource_metadata", metadata));
        }
        if let Some(scope) = &self.scope {
            params.push(("scope", scope));
        }
        params.push(("error", &self.error));
        params.push(("error_description", &self.error_description));

        let rendered: Vec<String> = params
            .into_iter()
            .map(|(name, value)| format!("{name}=\"{}\"", sanitize(value)))
            .collect();
        format!("Bearer {}", rendered.join(", "))
    }
}

fn sanitize(value: &str) -> String {
    value
        .replace('"', "'")
        .replace(['\r', '\n'], " ")
}
