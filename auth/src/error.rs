//! Error types for the `auth` crate.
//!
//! `Error` covers infrastructure failures (building HTTP clients, fetching the
//! key set). `TokenValidationError` is what callers of the validator see and
//! always maps to HTTP 401.

use std::error::Error as StdError;
use std::fmt;

/// Infrastructure error for the auth crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    KeySet(KeySetErrorKind),
    Http(HttpErrorKind),
}

/// Errors from resolving signing keys.
#[derive(Debug, PartialEq)]
pub enum KeySetErrorKind {
    /// The key set was fetched but contains no usable key for the `kid`.
    KeyNotFound,
    /// The key set response could not be decoded.
    InvalidKeySet,
    /// Too many refetches in the current window.
    RateLimited,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Status(u16),
    Network,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::KeySet(kind) => write!(f, "Key set error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
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

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if let Some(status) = err.status() {
            ErrorKind::Http(HttpErrorKind::Status(status.as_u16()))
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            other => Error {
                source: Some(Box::new(other)),
                error_kind: ErrorKind::Http(HttpErrorKind::Network),
            },
        }
    }
}

/// Helper function to create key set errors.
pub fn key_set_error(kind: KeySetErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::KeySet(kind),
    }
}

/// Why a bearer token was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
    MissingToken,
    InvalidToken,
    TokenExpired,
    TokenNotYetValid,
    MalformedToken,
    IssuerMismatch,
    AudienceMismatch,
    InsufficientScope,
}

impl TokenErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            TokenErrorKind::MissingToken => "missing_token",
            TokenErrorKind::InvalidToken => "invalid_token",
            TokenErrorKind::TokenExpired => "token_expired",
            TokenErrorKind::TokenNotYetValid => "token_not_yet_valid",
            TokenErrorKind::MalformedToken => "malformed_token",
            TokenErrorKind::IssuerMismatch => "issuer_mismatch",
            TokenErrorKind::AudienceMismatch => "audience_mismatch",
            TokenErrorKind::InsufficientScope => "insufficient_scope",
        }
    }
}

/// A bearer token failed validation.
#[derive(Debug)]
pub struct TokenValidationError {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: TokenErrorKind,
    message: String,
}

impl TokenValidationError {
    pub fn new(error_kind: TokenErrorKind, message: impl Into<String>) -> Self {
        Self {
            source: None,
            error_kind,
            message: message.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn missing_token() -> Self {
        Self::new(TokenErrorKind::MissingToken, "Missing OAuth access token.")
    }

    pub fn code(&self) -> &'static str {
        self.error_kind.code()
    }

    /// HTTP status for every validation failure.
    pub fn status(&self) -> u16 {
        401
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// RFC 6750 `error` parameter for the `WWW-Authenticate` challenge.
    pub fn challenge_error(&self) -> &'static str {
        match self.error_kind {
            TokenErrorKind::InsufficientScope => "insufficient_scope",
            _ => "invalid_token",
        }
    }
}

impl fmt::Display for TokenValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl StdError for TokenValidationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<jsonwebtoken::errors::Error> for TokenValidationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtKind;

        let (kind, message) = match err.kind() {
            JwtKind::ExpiredSignature => (TokenErrorKind::TokenExpired, "Access token has expired."),
            JwtKind::ImmatureSignature => (
                TokenErrorKind::TokenNotYetValid,
                "Access token is not yet valid.",
            ),
            JwtKind::InvalidIssuer => (
                TokenErrorKind::IssuerMismatch,
                "Access token issuer is not trusted.",
            ),
            JwtKind::InvalidAudience => (
                TokenErrorKind::AudienceMismatch,
                "Access token audience is not accepted.",
            ),
            JwtKind::MissingRequiredClaim(claim) if claim == "iss" => (
                TokenErrorKind::IssuerMismatch,
                "Access token issuer is not trusted.",
            ),
            JwtKind::MissingRequiredClaim(claim) if claim == "aud" => (
                TokenErrorKind::AudienceMismatch,
                "Access token audience is not accepted.",
            ),
            JwtKind::InvalidSignature => (
                TokenErrorKind::InvalidToken,
                "Access token signature is invalid.",
            ),
            JwtKind::InvalidToken
            | JwtKind::Base64(_)
            | JwtKind::Json(_)
            | JwtKind::Utf8(_) => (TokenErrorKind::MalformedToken, "Access token is malformed."),
            _ => (TokenErrorKind::InvalidToken, "Access token is not valid."),
        };

        TokenValidationError::new(kind, message).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind as JwtKind;

    #[test]
    fn test_every_validation_error_is_unauthorized() {
        let err = TokenValidationError::new(TokenErrorKind::InsufficientScope, "nope");
        assert_eq!(err.status(), 401);
        assert_eq!(TokenValidationError::missing_token().status(), 401);
    }

    #[test]
    fn test_challenge_error_uses_rfc6750_values() {
        let scope = TokenValidationError::new(TokenErrorKind::InsufficientScope, "x");
        assert_eq!(scope.challenge_error(), "insufficient_scope");

        for kind in [
            TokenErrorKind::MissingToken,
            TokenErrorKind::TokenExpired,
            TokenErrorKind::AudienceMismatch,
        ] {
            let err = TokenValidationError::new(kind, "x");
            assert_eq!(err.challenge_error(), "invalid_token");
        }
    }

    #[test]
    fn test_jwt_errors_map_to_token_codes() {
        let expired: TokenValidationError =
            jsonwebtoken::errors::Error::from(JwtKind::ExpiredSignature).into();
        assert_eq!(expired.code(), "token_expired");
        assert_eq!(expired.message(), "Access token has expired.");

        let immature: TokenValidationError =
            jsonwebtoken::errors::Error::from(JwtKind::ImmatureSignature).into();
        assert_eq!(immature.code(), "token_not_yet_valid");

        let missing_aud: TokenValidationError =
            jsonwebtoken::errors::Error::from(JwtKind::MissingRequiredClaim("aud".into())).into();
        assert_eq!(missing_aud.code(), "audience_mismatch");

        let malformed: TokenValidationError =
            jsonwebtoken::errors::Error::from(JwtKind::InvalidToken).into();
        assert_eq!(malformed.code(), "malformed_token");
    }

    #[test]
    fn test_display_includes_code() {
        let err = TokenValidationError::missing_token();
        assert_eq!(err.to_string(), "Missing OAuth access token. (missing_token)");
    }
}
