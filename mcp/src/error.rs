//! Error types for the `mcp` crate.
//!
//! JSON-RPC failures use [`crate::rpc::RpcError`]; this type covers the
//! NeonPanel gateway and tool registration.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Gateway(GatewayErrorKind),
    DuplicateTool(String),
}

/// Failures talking to the NeonPanel REST API.
#[derive(Debug, PartialEq)]
pub enum GatewayErrorKind {
    /// NeonPanel answered with a non-success status.
    Status(u16),
    Network,
    InvalidResponse,
    Config,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Gateway(GatewayErrorKind::Status(status)) => {
                write!(f, "NeonPanel API responded with status {status}")
            }
            ErrorKind::Gateway(GatewayErrorKind::Network) => {
                write!(f, "NeonPanel API request failed")
            }
            ErrorKind::Gateway(GatewayErrorKind::InvalidResponse) => {
                write!(f, "NeonPanel API returned an unreadable response")
            }
            ErrorKind::Gateway(GatewayErrorKind::Config) => {
                write!(f, "NeonPanel API client is misconfigured")
            }
            ErrorKind::DuplicateTool(name) => write!(f, "Duplicate tool registration: {name}"),
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
        let kind = if let Some(status) = err.status() {
            GatewayErrorKind::Status(status.as_u16())
        } else if err.is_decode() {
            GatewayErrorKind::InvalidResponse
        } else if err.is_builder() {
            GatewayErrorKind::Config
        } else {
            GatewayErrorKind::Network
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Gateway(kind),
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            other => Error {
                source: Some(Box::new(other)),
                error_kind: ErrorKind::Gateway(GatewayErrorKind::Network),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_does_not_leak_upstream_details() {
        let err = Error {
            source: Some("connection reset by 10.0.0.7".into()),
            error_kind: ErrorKind::Gateway(GatewayErrorKind::Network),
        };
        assert_eq!(err.to_string(), "NeonPanel API request failed");
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_status_display() {
        let err = Error {
            source: None,
            error_kind: ErrorKind::Gateway(GatewayErrorKind::Status(403)),
        };
        assert_eq!(err.to_string(), "NeonPanel API responded with status 403");
    }
}
