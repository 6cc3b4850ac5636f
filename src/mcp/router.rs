//! Path routing for the HTTP surface

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use super::dispatcher::Dispatcher;
use super::self_test;
use super::types::*;
use crate::http::{HttpResponse, RawRequest};

/// `/mcp` and everything below it carries protocol traffic
pub fn is_protocol_path(path: &str) -> bool {
    path == "/mcp" || path.starts_with("/mcp/")
}

const JSONRPC_METHODS: &[&str] = &[
    "initialize",
    "initialized",
    "tools/list",
    "tools/call",
    "resources/list",
    "prompts/list",
    "ping",
];

pub struct Router {
    dispatcher: Arc<Dispatcher>,
    local_addr: OnceLock<SocketAddr>,
    started_at: DateTime<Utc>,
    started: Instant,
    requests_served: AtomicU64,
}

impl Router {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            local_addr: OnceLock::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            requests_served: AtomicU64::new(0),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn set_local_addr(&self, addr: SocketAddr) {
        let _ = self.local_addr.set(addr);
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    /// Route one request to its handler
    pub async fn route(&self, req: &RawRequest) -> HttpResponse {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        debug!("{} {}", req.method, req.path);

        let method = req.method.as_str();
        let response = match req.path.as_str() {
            "/mcp" => match method {
                "POST" => return self.handle_rpc(req).await,
                "GET" => self.endpoint_description(),
                _ => HttpResponse::method_not_allowed("GET, POST"),
            },
            "/mcp/status" if method == "GET" => self.status().await,
            "/mcp/capabilities" | "/capabilities" | "/help" if method == "GET" => {
                self.capabilities()
            }
            "/test/mcp" if method == "GET" => {
                let report = self_test::run(&self.dispatcher).await;
                HttpResponse::json_of(200, &report)
            }
            "/mcp/status" | "/mcp/capabilities" | "/capabilities" | "/help" | "/test/mcp" => {
                HttpResponse::method_not_allowed("GET")
            }
            p if p.starts_with("/ping") => HttpResponse::text(200, "pong"),
            _ => HttpResponse::not_found(),
        };

        if !is_protocol_path(&req.path) {
            return response;
        }

        // Known sessions are refreshed by any protocol-path request
        if let Some(id) = req.session_id() {
            if self.dispatcher.sessions().touch(id).await {
                return response.with_session_id(id);
            }
        }
        response
    }

    /// POST /mcp: one ProtocolMessage in, at most one out
    async fn handle_rpc(&self, req: &RawRequest) -> HttpResponse {
        let sessions = self.dispatcher.sessions();
        let presented = req.session_id();

        let dispatch = match self.dispatcher.dispatch_body(&req.body).await {
            Ok(dispatch) => dispatch,
            Err(parse_error) => {
                let response = HttpResponse::json_of(400, &parse_error);
                if let Some(id) = presented {
                    if sessions.touch(id).await {
                        return response.with_session_id(id);
                    }
                }
                return response;
            }
        };

        let session_id = match dispatch.minted_session {
            Some(minted) => minted,
            None => sessions.resolve(presented).await,
        };

        match dispatch.response {
            Some(response) => HttpResponse::json_of(200, &response).with_session_id(session_id),
            None => HttpResponse::empty(202).with_session_id(session_id),
        }
    }

    fn endpoint_description(&self) -> HttpResponse {
        HttpResponse::json(
            200,
            &json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol": "MCP",
                "protocolVersion": LATEST_PROTOCOL_VERSION,
                "supportedProtocolVersions": SUPPORTED_PROTOCOL_VERSIONS,
                "transport": "http",
                "endpoint": "/mcp",
                "usage": "POST a JSON-RPC 2.0 request to /mcp; send Mcp-Session-Id to correlate calls",
                "methods": JSONRPC_METHODS,
            }),
        )
    }

    async fn status(&self) -> HttpResponse {
        let address = self
            .local_addr
            .get()
            .map(|a| a.to_string())
            .unwrap_or_default();
        HttpResponse::json(
            200,
            &json!({
                "status": "running",
                "serverInfo": ServerInfo::current(),
                "address": address,
                "initialized": self.dispatcher.is_initialized(),
                "activeSessions": self.dispatcher.sessions().len().await,
                "sessionTimeoutMs": self.dispatcher.sessions().timeout().as_millis() as u64,
                "toolCount": self.dispatcher.tools().len(),
                "requestsServed": self.requests_served(),
                "startedAt": self.started_at.to_rfc3339(),
                "uptimeSeconds": self.started.elapsed().as_secs(),
            }),
        )
    }

    fn capabilities(&self) -> HttpResponse {
        HttpResponse::json(200, &self.catalog())
    }

    /// Full capability and tool catalog
    pub fn catalog(&self) -> Value {
        json!({
            "serverInfo": ServerInfo::current(),
            "protocolVersion": LATEST_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::advertised(),
            "methods": JSONRPC_METHODS,
            "tools": self.dispatcher.tools().descriptors(),
            "endpoints": [
                {"path": "/mcp", "methods": ["GET", "POST"], "description": "Endpoint description (GET) and JSON-RPC calls (POST)"},
                {"path": "/mcp/status", "methods": ["GET"], "description": "Server status"},
                {"path": "/mcp/capabilities", "methods": ["GET"], "description": "This catalog"},
                {"path": "/capabilities", "methods": ["GET"], "description": "This catalog"},
                {"path": "/help", "methods": ["GET"], "description": "This catalog"},
                {"path": "/test/mcp", "methods": ["GET"], "description": "Run the built-in self-test"},
                {"path": "/ping", "methods": ["*"], "description": "Liveness probe"}
            ]
        })
    }
}
