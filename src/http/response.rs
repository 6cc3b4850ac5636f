//! Response emitter - status line, headers and byte-accurate bodies

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// What the response tells the client about the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirective {
    KeepAlive { timeout_secs: u64, max_requests: usize },
    Close,
}

impl ConnectionDirective {
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Self::KeepAlive { .. })
    }
}

/// Keep-alive rule: an explicit `close` always wins, otherwise protocol
/// paths and clients asking for keep-alive get it.
pub fn wants_keep_alive(protocol_path: bool, connection_header: Option<&str>) -> bool {
    let requested = connection_header.map(|v| v.to_ascii_lowercase());
    match requested.as_deref() {
        Some(v) if v.split(',').any(|t| t.trim() == "close") => false,
        Some(v) if v.split(',').any(|t| t.trim() == "keep-alive") => true,
        _ => protocol_path,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    /// UTF-8 encoded body; Content-Length is its length
    pub body: Vec<u8>,
    pub session_id: Option<String>,
    pub allow: Option<&'static str>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type,
            body: encode_utf8(body),
            session_id: None,
            allow: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status, CONTENT_TYPE_TEXT, body)
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, CONTENT_TYPE_JSON, &value.to_string())
    }

    /// Serialize any payload as a JSON body, falling back to a 500 on failure
    pub fn json_of<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self::new(status, CONTENT_TYPE_JSON, &body),
            Err(e) => Self::json(
                500,
                &serde_json::json!({"error": format!("Serialization failed: {}", e)}),
            ),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, CONTENT_TYPE_TEXT, "")
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn bad_request(message: &str) -> Self {
        Self::text(400, message)
    }

    pub fn method_not_allowed(allow: &'static str) -> Self {
        Self::text(405, "Method Not Allowed").with_allow(allow)
    }

    pub fn internal_error() -> Self {
        Self::json(500, &serde_json::json!({"error": "Internal server error"}))
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_allow(mut self, allow: &'static str) -> Self {
        self.allow = Some(allow);
        self
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Header lines in emission order, without the status line
    pub fn headers(&self, directive: ConnectionDirective) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", self.content_type.to_string()),
            ("Content-Length", self.content_length().to_string()),
        ];
        if let Some(session_id) = &self.session_id {
            headers.push(("Mcp-Session-Id", session_id.clone()));
        }
        match directive {
            ConnectionDirective::KeepAlive {
                timeout_secs,
                max_requests,
            } => {
                headers.push(("Connection", "keep-alive".to_string()));
                headers.push((
                    "Keep-Alive",
                    format!("timeout={}, max={}", timeout_secs, max_requests),
                ));
            }
            ConnectionDirective::Close => {
                headers.push(("Connection", "close".to_string()));
            }
        }
        if let Some(allow) = self.allow {
            headers.push(("Allow", allow.to_string()));
        }
        headers
    }

    /// Full wire form; headers are only built after the body is encoded
    pub fn encode(&self, directive: ConnectionDirective) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in self.headers(directive) {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(&value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut wire = Vec::with_capacity(head.len() + self.body.len());
        wire.extend_from_slice(head.as_bytes());
        wire.extend_from_slice(&self.body);
        wire
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        directive: ConnectionDirective,
    ) -> std::io::Result<()> {
        writer.write_all(&self.encode(directive)).await?;
        writer.flush().await
    }
}

/// Explicit UTF-8 encoding step; byte length, not character count, is what goes on the wire
fn encode_utf8(body: &str) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(body.len());
    buffer.extend_from_slice(body.as_bytes());
    buffer
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
