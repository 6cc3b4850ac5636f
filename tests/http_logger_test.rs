//! Tests for http_logger module

use library_mcp::http_logger::{
    is_enabled, is_sensitive_header, log_exchange, mask_token, truncate_utf8_safe,
};
use library_mcp::http::{ConnectionDirective, HttpResponse, RawRequest};

#[test]
fn test_truncate_utf8_safe_ascii() {
    let s = "pong";
    assert_eq!(truncate_utf8_safe(s, 100), s);
    assert!(truncate_utf8_safe("Hello, World!", 5).starts_with("Hello"));
}

#[test]
fn test_truncate_utf8_safe_multibyte() {
    let s = "a€€€€b";
    // '€' is three bytes, so a cut at 5 falls inside the second one
    let truncated = truncate_utf8_safe(s, 5);
    assert!(truncated.starts_with("a€..."));
    assert!(truncated.contains("[truncated, total 14 bytes]"));
}

#[test]
fn test_mask_token_bearer() {
    assert_eq!(mask_token("Bearer abcdefghijklmnop"), "Bearer abcd...mnop");
    assert_eq!(mask_token("Bearer short"), "Bearer ****");
}

#[test]
fn test_mask_token_generic() {
    assert_eq!(mask_token("abcdefghijklmnop"), "abcd...mnop");
    assert_eq!(mask_token("short"), "****");
}

#[test]
fn test_is_sensitive_header() {
    assert!(is_sensitive_header("Authorization"));
    assert!(is_sensitive_header("cookie"));
    assert!(is_sensitive_header("X-Api-Key"));
    assert!(!is_sensitive_header("Mcp-Session-Id"));
    assert!(!is_sensitive_header("Content-Type"));
}

#[test]
fn test_log_exchange_disabled_writes_nothing() {
    if is_enabled() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");
    let request = RawRequest::parse(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
    log_exchange(
        &log_dir,
        "127.0.0.1:5555",
        Some(&request),
        &HttpResponse::text(200, "pong"),
        ConnectionDirective::Close,
        1,
    );
    assert!(!log_dir.exists());
}
