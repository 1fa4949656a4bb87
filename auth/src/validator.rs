//! RS256 access token verification.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use log::*;
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::context::ValidatedAccessToken;
use crate::error::{TokenErrorKind, TokenValidationError};
use crate::jwks::{KeySetStatus, KeySource};

/// Scope carried by initial access tokens that may only register clients.
pub const REGISTRATION_ONLY_SCOPE: &str = "dcr.create";

#[derive(Debug, Clone)]
pub struct TokenValidatorConfig {
    pub issuer: String,
    pub audience: String,
    pub required_scopes: Vec<String>,
}

impl From<&service::config::Config> for TokenValidatorConfig {
    fn from(config: &service::config::Config) -> Self {
        Self {
            issuer: config.oauth_issuer().to_string(),
            audience: config.neonpanel_oauth_expected_audience.clone(),
            required_scopes: config.required_scopes(),
        }
    }
}

/// Verifies bearer tokens against the configured issuer, audience and scopes.
///
/// Nothing is cached per token; every call verifies from scratch with keys
/// from the [`KeySource`].
pub struct TokenValidator {
    keys: Arc<dyn KeySource>,
    config: TokenValidatorConfig,
}

impl TokenValidator {
    pub fn new(keys: Arc<dyn KeySource>, config: TokenValidatorConfig) -> Self {
        Self { keys, config }
    }

    /// Reachability of the signing keys, for deep health checks.
    pub async fn key_set_status(&self) -> KeySetStatus {
        self.keys.status().await
    }

    pub async fn validate(&self, token: &str) -> Result<ValidatedAccessToken, TokenValidationError> {
        if token.trim().is_empty() {
            return Err(TokenValidationError::missing_token());
        }

        let header = decode_header(token)?;
        let kid = header.kid.ok_or_else(|| {
            TokenValidationError::new(
                TokenErrorKind::InvalidToken,
                "Token header missing key identifier (kid).",
            )
        })?;

        let key = self.keys.resolve(&kid).await.map_err(|err| {
            warn!("Unable to resolve signing key {kid}: {err}");
            TokenValidationError::new(
                TokenErrorKind::InvalidToken,
                "Unable to resolve signing key for token.",
            )
            .with_source(err)
        })?;

        let data = decode::<Map<String, Value>>(token, &key, &self.validation())?;
        let payload = data.claims;
        let scopes = extract_scopes(&payload);

        if scopes.len() == 1 && scopes[0] == REGISTRATION_ONLY_SCOPE {
            return Err(TokenValidationError::new(
                TokenErrorKind::InvalidToken,
                "Initial access tokens (scope dcr.create) are not permitted for MCP requests.",
            ));
        }

        let missing: Vec<&str> = self
            .config
            .required_scopes
            .iter()
            .filter(|required| !scopes.contains(required))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(TokenValidationError::new(
                TokenErrorKind::InsufficientScope,
                format!("Access token missing required scopes: {}", missing.join(", ")),
            ));
        }

        Ok(ValidatedAccessToken::new(
            SecretString::new(token.to_string()),
            payload,
            scopes,
        ))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);
        validation.required_spec_claims =
            HashSet::from(["iss".to_string(), "aud".to_string()]);
        validation
    }
}

/// Merges the `scope` string claim and the `scp` array claim, keeping first
/// appearance order and dropping empties and duplicates.
pub fn extract_scopes(payload: &Map<String, Value>) -> Vec<String> {
    let from_scope = payload
        .get("scope")
        .and_then(Value::as_str)
        .into_iter()
        .flat_map(str::split_whitespace);
    let from_scp = payload
        .get("scp")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);

    let mut scopes: Vec<String> = Vec::new();
    for scope in from_scope.chain(from_scp) {
        if !scope.is_empty() && !scopes.iter().any(|seen| seen == scope) {
            scopes.push(scope.to_string());
        }
    }
    scopes
}
