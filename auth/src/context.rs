//! Caller identity produced by token validation.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The `aud` claim, kept in the shape the issuer used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub(crate) fn from_claim(value: &Value) -> Option<Self> {
        match value {
            Value::String(aud) => Some(Audience::Single(aud.clone())),
            Value::Array(items) => Some(Audience::Multiple(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// The record of one successful token verification.
#[derive(Debug)]
pub struct ValidatedAccessToken {
    pub token: SecretString,
    pub payload: Map<String, Value>,
    pub scopes: Vec<String>,
    pub subject: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<Audience>,
    pub expires_at: Option<i64>,
    pub issued_at: Option<i64>,
}

impl ValidatedAccessToken {
    pub fn new(
        token: SecretString,
        payload: Map<String, Value>,
        scopes: Vec<String>,
    ) -> Self {
        let string_claim = |name: &str| {
            payload
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            subject: string_claim("sub").filter(|sub| !sub.is_empty()),
            issuer: string_claim("iss"),
            audience: payload.get("aud").and_then(Audience::from_claim),
            expires_at: payload.get("exp").and_then(Value::as_i64),
            issued_at: payload.get("iat").and_then(Value::as_i64),
            token,
            payload,
            scopes,
        }
    }
}

/// Immutable identity attached to a request or an SSE session.
///
/// Cloning is cheap; the verified token is shared.
#[derive(Clone, Debug)]
pub struct AuthContext {
    validated: Option<Arc<ValidatedAccessToken>>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { validated: None }
    }

    pub fn is_anonymous(&self) -> bool {
        self.validated.is_none()
    }

    /// The raw bearer token, empty for anonymous callers.
    pub fn token(&self) -> &str {
        self.validated
            .as_ref()
            .map(|validated| validated.token.expose_secret().as_str())
            .unwrap_or_default()
    }

    pub fn scopes(&self) -> &[String] {
        self.validated
            .as_ref()
            .map(|validated| validated.scopes.as_slice())
            .unwrap_or_default()
    }

    pub fn subject(&self) -> Option<&str> {
        self.validated
            .as_ref()
            .and_then(|validated| validated.subject.as_deref())
    }

    /// Hex SHA-256 of the bearer token, `None` when anonymous.
    pub fn token_hash(&self) -> Option<String> {
        self.validated
            .as_ref()
            .map(|validated| hash_token(validated.token.expose_secret()))
    }
}

impl From<ValidatedAccessToken> for AuthContext {
    fn from(validated: ValidatedAccessToken) -> Self {
        Self {
            validated: Some(Arc::new(validated)),
        }
    }
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
