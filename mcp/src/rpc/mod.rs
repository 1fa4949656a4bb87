//! JSON-RPC 2.0 envelope, error codes and method dispatch.

pub mod dispatcher;
pub mod error;
pub mod types;

pub use dispatcher::{Dispatcher, MethodHandler};
pub use error::{ErrorObject, RpcError};
pub use types::{JsonRpcRequest, JsonRpcResponse, Outcome, RequestId};
