//! Method registry and async dispatch.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthContext;
use futures::FutureExt;
use log::*;
use serde_json::Value;

use super::error::{ErrorObject, RpcError, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
use super::types::{JsonRpcRequest, JsonRpcResponse};

/// Trait implemented by every JSON-RPC method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>, ctx: &AuthContext) -> Result<Value, RpcError>;
}

/// Maps method names to handlers and turns every outcome into a response.
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        if self
            .handlers
            .insert(method.to_owned(), Arc::new(handler))
            .is_some()
        {
            warn!("Handler for JSON-RPC method {method} was replaced");
        }
    }

    /// Validates `payload`, runs the matching handler and builds the response.
    /// Never fails: envelope, routing, handler and panic failures all become
    /// JSON-RPC error objects.
    pub async fn handle(&self, payload: Value, ctx: &AuthContext) -> JsonRpcResponse {
        let request = match JsonRpcRequest::from_value(payload) {
            Ok(request) => request,
            Err(detail) => {
                warn!("Invalid JSON-RPC request payload: {detail}");
                return JsonRpcResponse::error(
                    None,
                    ErrorObject::new(INVALID_REQUEST, "Invalid Request").with_data(Value::String(detail)),
                );
            }
        };

        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let Some(handler) = self.handlers.get(&method) else {
            return JsonRpcResponse::error(
                id,
                ErrorObject::new(METHOD_NOT_FOUND, format!("Method not found: {method}")),
            );
        };

        let outcome = AssertUnwindSafe(handler.handle(params, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => JsonRpcResponse::success(id, result),
            Ok(Err(RpcError::Rpc(error))) => JsonRpcResponse::error(id, error),
            Ok(Err(RpcError::Internal(err))) => {
                error!("Unhandled error during JSON-RPC call {method}: {err:?}");
                JsonRpcResponse::error(id, ErrorObject::internal())
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!("JSON-RPC handler for {method} panicked: {detail}");
                JsonRpcResponse::error(id, ErrorObject::internal())
            }
        }
    }

    /// Response for a body that was not JSON at all.
    pub fn parse_error(detail: impl Into<String>) -> JsonRpcResponse {
        JsonRpcResponse::error(
            None,
            ErrorObject::new(PARSE_ERROR, "Parse error").with_data(Value::String(detail.into())),
        )
    }

}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::error::INTERNAL_ERROR;
    use crate::rpc::types::RequestId;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn handle(&self, params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    struct TypedFailHandler;

    #[async_trait]
    impl MethodHandler for TypedFailHandler {
        async fn handle(&self, _params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
            Err(RpcError::new(-32001, "Upstream unavailable").with_data(json!({"retry": true})))
        }
    }

    struct InternalFailHandler;

    #[async_trait]
    impl MethodHandler for InternalFailHandler {
        async fn handle(&self, _params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
            Err(RpcError::internal("database password is hunter2"))
        }
    }

    struct PanicHandler;

    #[async_trait]
    impl MethodHandler for PanicHandler {
        async fn handle(&self, _params: Option<Value>, _ctx: &AuthContext) -> Result<Value, RpcError> {
            panic!("boom")
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("echo", EchoHandler);
        dispatcher.register("typed", TypedFailHandler);
        dispatcher.register("internal", InternalFailHandler);
        dispatcher.register("panic", PanicHandler);
        dispatcher
    }

    async fn call(payload: Value) -> JsonRpcResponse {
        dispatcher().handle(payload, &AuthContext::anonymous()).await
    }

    #[tokio::test]
    async fn test_success_echoes_id() {
        let response = call(json!({"jsonrpc": "2.0", "id": "req-1", "method": "echo", "params": {"x": 1}})).await;
        assert_eq!(response.id, Some(RequestId::String("req-1".into())));
        assert_eq!(response.result(), Some(&json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        for method in ["nope", "tools/unknown", ""] {
            let response = call(json!({"jsonrpc": "2.0", "id": 3, "method": method})).await;
            let error = response.error_object().unwrap();
            assert_eq!(error.code, METHOD_NOT_FOUND);
            assert_eq!(error.message, format!("Method not found: {method}"));
            assert_eq!(response.id, Some(RequestId::Number(3.into())));
        }
    }

    #[tokio::test]
    async fn test_malformed_envelope_has_null_id() {
        for payload in [
            json!({"id": 1, "method": "echo"}),
            json!({"jsonrpc": "2.0", "id": 1, "method": 42}),
            json!({"jsonrpc": "2.0", "id": 1}),
        ] {
            let response = call(payload).await;
            assert_eq!(response.id, None);
            let error = response.error_object().unwrap();
            assert_eq!(error.code, INVALID_REQUEST);
            assert_eq!(error.message, "Invalid Request");
            assert!(error.data.is_some());
        }
    }

    #[tokio::test]
    async fn test_typed_errors_surface_verbatim() {
        let response = call(json!({"jsonrpc": "2.0", "id": 1, "method": "typed"})).await;
        let error = response.error_object().unwrap();
        assert_eq!(error.code, -32001);
        assert_eq!(error.message, "Upstream unavailable");
        assert_eq!(error.data, Some(json!({"retry": true})));
    }

    #[tokio::test]
    async fn test_internal_errors_do_not_leak_details() {
        let response = call(json!({"jsonrpc": "2.0", "id": 1, "method": "internal"})).await;
        assert_eq!(response.error_object(), Some(&ErrorObject::internal()));
        assert!(!response.to_value().to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_panics_become_internal_error() {
        let response = call(json!({"jsonrpc": "2.0", "id": 9, "method": "panic"})).await;
        let error = response.error_object().unwrap();
        assert_eq!(error.code, INTERNAL_ERROR);
        assert_eq!(error.message, "Internal error");
    }

    #[test]
    fn test_parse_error_response() {
        let response = Dispatcher::parse_error("expected value at line 1");
        assert_eq!(response.id, None);
        assert_eq!(response.error_object().unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_reregistering_a_method_replaces_its_handler() {
        let mut dispatcher = dispatcher();
        dispatcher.register("echo", TypedFailHandler);

        let response = dispatcher
            .handle(
                json!({"jsonrpc": "2.0", "id": 1, "method": "echo"}),
                &AuthContext::anonymous(),
            )
            .await;

        assert!(response.error_object().is_some());
    }
}
