use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn internal() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }
}

/// Failure returned by a method handler.
///
/// `Rpc` reaches the caller verbatim. `Internal` is logged and replaced with a
/// generic internal error.
#[derive(Debug)]
pub enum RpcError {
    Rpc(ErrorObject),
    Internal(Box<dyn StdError + Send + Sync>),
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        RpcError::Rpc(ErrorObject::new(code, message))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, "Invalid params").with_data(Value::String(message.into()))
    }

    pub fn internal(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        RpcError::Internal(err.into())
    }

    pub fn with_data(self, data: Value) -> Self {
        match self {
            RpcError::Rpc(object) => RpcError::Rpc(object.with_data(data)),
            internal => internal,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RpcError::Rpc(object) => write!(f, "JSON-RPC error {}: {}", object.code, object.message),
            RpcError::Internal(err) => write!(f, "Internal handler error: {err}"),
        }
    }
}

impl StdError for RpcError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RpcError::Rpc(_) => None,
            RpcError::Internal(err) => Some(err.as_ref() as &(dyn StdError + 'static)),
        }
    }
}
