//! HTTP exchange logger
//!
//! Logs every inbound request and the response written for it to a file when
//! enabled via environment variable.
//! Set `LIBRARY_MCP_HTTP_LOG=1` or `LIBRARY_MCP_HTTP_LOG=true` to enable.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing::warn;

use crate::http::{ConnectionDirective, HttpResponse, RawRequest};

/// Environment variable to control HTTP logging
const ENV_HTTP_LOG: &str = "LIBRARY_MCP_HTTP_LOG";

/// Log file name
const LOG_FILE_NAME: &str = "http_requests.log";

/// Maximum body size to log (10KB)
const MAX_BODY_SIZE: usize = 10000;

/// Sensitive headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "set-cookie",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "proxy-authorization",
];

/// Global mutex for thread-safe log writing
static LOG_MUTEX: Mutex<()> = Mutex::new(());

/// Check if HTTP logging is enabled
pub fn is_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(ENV_HTTP_LOG)
            .map(|v| {
                let v = v.trim().to_lowercase();
                v == "1" || v == "true" || v == "yes" || v == "on"
            })
            .unwrap_or(false)
    })
}

/// Log file path inside `log_dir`, creating the directory on demand
fn get_log_file_path(log_dir: &Path) -> PathBuf {
    if !log_dir.exists() {
        if let Err(e) = fs::create_dir_all(log_dir) {
            warn!("Failed to create log directory {}: {}", log_dir.display(), e);
        }
    }
    log_dir.join(LOG_FILE_NAME)
}

/// HTTP request log entry
pub struct HttpRequestLog {
    pub peer: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// HTTP response log entry
pub struct HttpResponseLog {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Log an HTTP request and the response written for it
pub fn log_request(
    log_dir: &Path,
    request: &HttpRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) {
    if !is_enabled() {
        return;
    }

    let log_path = get_log_file_path(log_dir);
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let separator = "=".repeat(80);

    let mut log_content = String::new();
    log_content.push_str(&format!(
        "\n{}\n[{}] {} {} {}\n{}\n",
        separator, timestamp, request.peer, request.method, request.url, separator
    ));

    // Request headers
    log_content.push_str("\n--- Request Headers ---\n");
    for (name, value) in &request.headers {
        let display_value = mask_sensitive_header(name, value);
        log_content.push_str(&format!("{}: {}\n", name, display_value));
    }

    // Request body
    if let Some(body) = &request.body {
        log_content.push_str("\n--- Request Body ---\n");
        log_content.push_str(&format_body(body));
        log_content.push('\n');
    }

    // Response
    if let Some(resp) = response {
        log_content.push_str(&format!("\n--- Response ({}ms) ---\n", duration_ms));
        log_content.push_str(&format!("Status: {}\n", resp.status));

        log_content.push_str("\n--- Response Headers ---\n");
        for (name, value) in &resp.headers {
            let display_value = mask_sensitive_header(name, value);
            log_content.push_str(&format!("{}: {}\n", name, display_value));
        }

        if let Some(body) = &resp.body {
            log_content.push_str("\n--- Response Body ---\n");
            log_content.push_str(&format_body(body));
            log_content.push('\n');
        }
    }

    // Error
    if let Some(err) = error {
        log_content.push_str(&format!("\n--- Error ({}ms) ---\n", duration_ms));
        log_content.push_str(err);
        log_content.push('\n');
    }

    log_content.push_str(&format!("\n{}\n", "=".repeat(80)));

    // Write to file with mutex protection
    if let Err(e) = write_log(&log_path, &log_content) {
        warn!("Failed to write HTTP log: {}", e);
    }
}

/// Write log content to file (thread-safe)
fn write_log(path: &Path, content: &str) -> std::io::Result<()> {
    // Acquire lock to prevent interleaved writes from concurrent requests
    let _guard = LOG_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Check if a header is sensitive and should be masked
pub fn is_sensitive_header(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    SENSITIVE_HEADERS.iter().any(|h| name_lower == *h)
}

/// Mask sensitive header values
fn mask_sensitive_header(name: &str, value: &str) -> String {
    if is_sensitive_header(name) {
        mask_token(value)
    } else {
        value.to_string()
    }
}

/// Keep the first and last four characters of a credential (UTF-8 safe)
pub fn mask_token(value: &str) -> String {
    let (scheme, token) = match value.strip_prefix("Bearer ") {
        Some(token) => ("Bearer ", token),
        None => ("", value),
    };

    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return format!("{}****", scheme);
    }

    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}...{}", scheme, prefix, suffix)
}

/// Format body for logging with truncation (UTF-8 safe)
fn format_body(body: &str) -> String {
    // Try to parse and pretty-print JSON
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let pretty = serde_json::to_string_pretty(&json).unwrap_or_else(|_| body.to_string());
        // Truncate pretty-printed JSON if too large
        truncate_utf8_safe(&pretty, MAX_BODY_SIZE)
    } else {
        // Non-JSON body, truncate if needed
        truncate_utf8_safe(body, MAX_BODY_SIZE)
    }
}

/// Truncate string at UTF-8 character boundary (safe for multi-byte chars)
pub fn truncate_utf8_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    // Find the last valid UTF-8 character boundary before max_len
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...\n[truncated, total {} bytes]", &s[..end], s.len())
}

/// Record one served exchange; no-op unless logging is enabled
pub fn log_exchange(
    log_dir: &Path,
    peer: &str,
    request: Option<&RawRequest>,
    response: &HttpResponse,
    directive: ConnectionDirective,
    duration_ms: u64,
) {
    if !is_enabled() {
        return;
    }

    let request_log = match request {
        Some(req) => HttpRequestLog {
            peer: peer.to_string(),
            method: req.method.clone(),
            url: req.path.clone(),
            headers: req
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body: (!req.body.is_empty()).then(|| req.body.clone()),
        },
        None => HttpRequestLog {
            peer: peer.to_string(),
            method: "?".to_string(),
            url: "<unparsable request>".to_string(),
            headers: Vec::new(),
            body: None,
        },
    };

    let response_log = HttpResponseLog {
        status: response.status,
        headers: response
            .headers(directive)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        body: (!response.body.is_empty()).then(|| response.body_str()),
    };

    let error = request.is_none().then_some("Malformed request line");
    log_request(log_dir, &request_log, Some(&response_log), duration_ms, error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_file_path_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        let path = get_log_file_path(&log_dir);
        assert!(log_dir.is_dir());
        assert_eq!(path, log_dir.join(LOG_FILE_NAME));
    }

    #[test]
    fn test_format_body_pretty_prints_json() {
        let formatted = format_body(r#"{"jsonrpc":"2.0","id":1}"#);
        assert!(formatted.contains("\n"));
        assert!(formatted.contains("\"jsonrpc\": \"2.0\""));
    }

    #[test]
    fn test_format_body_keeps_plain_text() {
        assert_eq!(format_body("pong"), "pong");
    }

    #[test]
    fn test_write_log_appends() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        write_log(&path, "first\n").unwrap();
        write_log(&path, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
