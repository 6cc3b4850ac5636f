//! Tool invocation gateway - argument validation and handler dispatch

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use super::registry::{RequiredArgument, ToolRegistry};
use crate::mcp::types::{CallToolParams, CallToolResult, INTERNAL_ERROR};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Missing required argument '{argument}' for tool '{tool}'")]
    MissingArgument { tool: String, argument: String },
    #[error("Tool '{tool}' requires one of: {}", .arguments.join(", "))]
    MissingOneOf { tool: String, arguments: Vec<String> },
    #[error("Arguments for tool '{0}' must be an object")]
    InvalidArguments(String),
    #[error("{tool}: {message}")]
    Handler { tool: String, message: String },
}

impl GatewayError {
    /// JSON-RPC code used when this error reaches the client
    pub fn code(&self) -> i64 {
        INTERNAL_ERROR
    }
}

/// A present argument is non-null and, for strings, non-blank
fn is_present(arguments: &serde_json::Map<String, Value>, name: &str) -> bool {
    match arguments.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Check a tool's declared requirements against the supplied arguments
pub fn validate_arguments(
    tool: &str,
    requirements: &[RequiredArgument],
    arguments: &serde_json::Map<String, Value>,
) -> Result<(), GatewayError> {
    for requirement in requirements {
        match requirement {
            RequiredArgument::Field(name) => {
                if !is_present(arguments, name) {
                    return Err(GatewayError::MissingArgument {
                        tool: tool.to_string(),
                        argument: name.clone(),
                    });
                }
            }
            RequiredArgument::AnyOf(names) => {
                if !names.iter().any(|n| is_present(arguments, n)) {
                    return Err(GatewayError::MissingOneOf {
                        tool: tool.to_string(),
                        arguments: names.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Render a handler's value as the text of a content block
pub fn render_output(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

pub struct ToolGateway {
    registry: Arc<ToolRegistry>,
}

impl ToolGateway {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Validate, invoke and wrap a tool call
    pub async fn invoke(&self, params: CallToolParams) -> Result<CallToolResult, GatewayError> {
        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| GatewayError::UnknownTool(params.name.clone()))?;
        let name = tool.descriptor.name.clone();

        let arguments = match params.arguments {
            None | Some(Value::Null) => serde_json::Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(GatewayError::InvalidArguments(name)),
        };

        validate_arguments(&name, &tool.descriptor.required, &arguments)?;

        info!("Invoking tool: {}", name);
        debug!("Arguments for {}: {:?}", name, arguments);

        let handler = tool.handler.clone();
        match handler(Value::Object(arguments)).await {
            Ok(value) => Ok(CallToolResult::text(render_output(value))),
            Err(e) => {
                error!("Tool {} failed: {}", name, e);
                Err(GatewayError::Handler {
                    tool: name,
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_present_rejects_blank_and_null() {
        let args = json!({"a": "", "b": null, "c": "x", "d": 0});
        let map = args.as_object().unwrap();
        assert!(!is_present(map, "a"));
        assert!(!is_present(map, "b"));
        assert!(is_present(map, "c"));
        assert!(is_present(map, "d"));
        assert!(!is_present(map, "missing"));
    }

    #[test]
    fn test_render_output_string_is_verbatim() {
        assert_eq!(render_output(json!("plain")), "plain");
        assert!(render_output(json!({"k": 1})).contains("\"k\": 1"));
    }
}
