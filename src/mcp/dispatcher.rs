//! Protocol dispatcher - JSON-RPC method table

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::session::SessionRegistry;
use super::types::*;
use crate::tools::{ToolGateway, ToolRegistry};

/// Result of dispatching one protocol message
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// None for notifications
    pub response: Option<JsonRpcResponse>,
    /// Session minted by `initialize`
    pub minted_session: Option<String>,
}

impl Dispatch {
    fn reply(response: JsonRpcResponse) -> Self {
        Self {
            response: Some(response),
            minted_session: None,
        }
    }
}

/// Failure inside a method handler, carried as a JSON-RPC error
struct MethodError {
    code: i64,
    message: String,
}

impl MethodError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub struct Dispatcher {
    gateway: ToolGateway,
    sessions: Arc<SessionRegistry>,
    initialized: AtomicBool,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            gateway: ToolGateway::new(registry),
            sessions,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.gateway.registry()
    }

    /// Parse a request body and dispatch it.
    /// `Err` carries the -32700 response for an unparsable body.
    pub async fn dispatch_body(&self, body: &str) -> Result<Dispatch, JsonRpcResponse> {
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse request body: {}", e);
                return Err(JsonRpcResponse::error_with_data(
                    None,
                    PARSE_ERROR,
                    "Parse error".to_string(),
                    Some(json!(e.to_string())),
                ));
            }
        };

        let id = value.get("id").cloned().filter(|v| !v.is_null());
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Ok(Dispatch::reply(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                )));
            }
        };

        Ok(self.dispatch(request).await)
    }

    /// Dispatch one message; never panics outward
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Dispatch {
        debug!("Dispatching method: {}", request.method);

        if request.jsonrpc != JSONRPC_VERSION {
            return Dispatch::reply(JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let id = request.id.clone();
        let notification = request.is_notification();

        let outcome = AssertUnwindSafe(self.handle_method(request))
            .catch_unwind()
            .await;

        let (result, minted_session) = match outcome {
            Ok(handled) => handled,
            Err(_) => {
                error!("Method handler panicked");
                (
                    Err(MethodError::new(INTERNAL_ERROR, "Internal error")),
                    None,
                )
            }
        };

        if notification {
            if let Err(e) = &result {
                debug!("Notification failed silently: {}", e.message);
            }
            return Dispatch {
                response: None,
                minted_session,
            };
        }

        let response = match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, e.code, e.message),
        };

        Dispatch {
            response: Some(response),
            minted_session,
        }
    }

    async fn handle_method(
        &self,
        request: JsonRpcRequest,
    ) -> (Result<Value, MethodError>, Option<String>) {
        match request.method.as_str() {
            "initialize" => {
                let (result, session_id) = self.handle_initialize(request.params).await;
                (result, Some(session_id))
            }
            "initialized" | "notifications/initialized" => {
                self.initialized.store(true, Ordering::SeqCst);
                (Ok(json!({})), None)
            }
            "tools/list" => (self.handle_list_tools(), None),
            "tools/call" => (self.handle_call_tool(request.params).await, None),
            "resources/list" => (Ok(json!({"resources": []})), None),
            "resources/templates/list" => (Ok(json!({"resourceTemplates": []})), None),
            "prompts/list" => (Ok(json!({"prompts": []})), None),
            "ping" => (Ok(json!({})), None),
            other => (
                Err(MethodError::new(
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                )),
                None,
            ),
        }
    }

    /// Negotiate the protocol version and mint a fresh session
    async fn handle_initialize(&self, params: Option<Value>) -> (Result<Value, MethodError>, String) {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        let session_id = self.sessions.create().await;
        let protocol_version = negotiate_protocol_version(params.protocol_version.as_deref());

        info!(
            "Client initialized session {} with protocol {}",
            session_id, protocol_version
        );
        if let Some(client) = &params.client_info {
            debug!("Client info: {}", client);
        }

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities::advertised(),
            server_info: ServerInfo::current(),
        };

        let value = serde_json::to_value(result)
            .map_err(|e| MethodError::new(INTERNAL_ERROR, format!("Internal error: {}", e)));
        (value, session_id)
    }

    fn handle_list_tools(&self) -> Result<Value, MethodError> {
        let tools = self.tools().descriptors();
        Ok(json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, MethodError> {
        let params = params.ok_or_else(|| MethodError::new(INVALID_PARAMS, "Missing params"))?;

        let call_params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| MethodError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;

        let result = self
            .gateway
            .invoke(call_params)
            .await
            .map_err(|e| MethodError::new(e.code(), e.to_string()))?;

        serde_json::to_value(result)
            .map_err(|e| MethodError::new(INTERNAL_ERROR, format!("Internal error: {}", e)))
    }
}
