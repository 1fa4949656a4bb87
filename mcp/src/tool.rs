//! Callable tools and the registry `tools/list` and `tools/call` serve from.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthContext;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind};

/// How many `{"params": {...}}` wrappers are peeled off tool arguments.
const MAX_PARAMS_UNWRAP: usize = 5;

/// Per-call context handed to [`Tool::execute`].
pub struct ToolContext {
    pub auth: AuthContext,
}

/// Failure of a single tool call. Reported to the caller as an `isError`
/// result, never as a JSON-RPC error.
#[derive(Debug)]
pub enum ToolError {
    InvalidArguments(String),
    Upstream(Error),
    Failed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ToolError::InvalidArguments(message) => write!(f, "Invalid arguments: {message}"),
            ToolError::Upstream(err) => write!(f, "{err}"),
            ToolError::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        ToolError::Upstream(err)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn input_schema(&self) -> Value;

    fn output_schema(&self) -> Option<Value> {
        None
    }

    fn examples(&self) -> Option<Value> {
        None
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// One entry of the `tools/list` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListEntry {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Value>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), Error> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error {
                source: None,
                error_kind: ErrorKind::DuplicateTool(name),
            });
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Catalog entries in name order.
    pub fn list(&self) -> Vec<ToolListEntry> {
        self.tools
            .values()
            .map(|tool| ToolListEntry {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
                output_schema: tool.output_schema(),
                examples: tool.examples(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Normalizes raw `tools/call` arguments.
///
/// Missing arguments become `{}`. A string is parsed as JSON when it can be.
/// Clients that wrap arguments as `{"params": {...}}` get the wrapper removed,
/// up to a fixed depth.
pub fn unwrap_tool_arguments(arguments: Option<Value>) -> Value {
    let mut args = match arguments {
        None | Some(Value::Null) => return Value::Object(Map::new()),
        Some(Value::String(raw)) => {
            serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw))
        }
        Some(other) => other,
    };

    for _ in 0..MAX_PARAMS_UNWRAP {
        let inner = match &mut args {
            Value::Object(map) if map.len() == 1 => match map.get_mut("params") {
                Some(inner) if inner.is_object() => inner.take(),
                _ => break,
            },
            _ => break,
        };
        args = inner;
    }

    args
}
