//! Tests for MCP types module

use library_mcp::mcp::types::*;
use serde_json::json;

#[test]
fn test_json_rpc_request_serialization() {
    let request = JsonRpcRequest::new(Some(json!(1)), "tools/list", None);

    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"jsonrpc\":\"2.0\""));
    assert!(json.contains("\"method\":\"tools/list\""));
    assert!(!json.contains("params"));

    let deserialized: JsonRpcRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.method, "tools/list");
    assert!(!deserialized.is_notification());
}

#[test]
fn test_request_without_id_is_notification() {
    let request: JsonRpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
    assert!(request.is_notification());
    assert!(request.params.is_none());
}

#[test]
fn test_ping_response_wire_shape() {
    let response = JsonRpcResponse::success(Some(json!("1")), json!({}));
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"jsonrpc":"2.0","id":"1","result":{}}"#
    );
}

#[test]
fn test_json_rpc_response_error() {
    let response = JsonRpcResponse::error(Some(json!(1)), -32601, "Method not found".to_string());

    assert_eq!(response.jsonrpc, "2.0");
    assert!(response.is_error());
    assert!(response.result().is_none());

    let error = response.error_detail().unwrap();
    assert_eq!(error.code, METHOD_NOT_FOUND);
    assert_eq!(error.message, "Method not found");

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("result").is_none());
    assert!(json["error"].get("data").is_none());
}

#[test]
fn test_error_without_id_serializes_null() {
    let response = JsonRpcResponse::error_with_data(
        None,
        PARSE_ERROR,
        "Parse error".to_string(),
        Some(json!("expected value")),
    );
    let json = serde_json::to_value(&response).unwrap();
    assert!(json["id"].is_null());
    assert_eq!(json["error"]["code"], -32700);
    assert_eq!(json["error"]["data"], "expected value");
}

#[test]
fn test_json_rpc_response_roundtrip_keeps_outcome() {
    let response = JsonRpcResponse::success(Some(json!(7)), json!({"data": "test"}));
    let json = serde_json::to_string(&response).unwrap();

    let deserialized: JsonRpcResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, response);
    assert_eq!(deserialized.result(), Some(&json!({"data": "test"})));
}

#[test]
fn test_server_capabilities() {
    let json = serde_json::to_value(ServerCapabilities::advertised()).unwrap();
    assert_eq!(json["tools"]["listChanged"], false);
    assert!(json.get("resources").is_some());
    assert!(json.get("prompts").is_some());
    assert!(json.get("logging").is_none());
}

#[test]
fn test_initialize_result_field_names() {
    let result = InitializeResult {
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities::advertised(),
        server_info: ServerInfo::current(),
    };
    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["protocolVersion"], "2025-03-26");
    assert_eq!(json["serverInfo"]["name"], "library-mcp");
}

#[test]
fn test_negotiate_protocol_version() {
    assert_eq!(negotiate_protocol_version(Some("2024-11-05")), "2024-11-05");
    assert_eq!(negotiate_protocol_version(Some("1999-01-01")), LATEST_PROTOCOL_VERSION);
    assert_eq!(negotiate_protocol_version(None), LATEST_PROTOCOL_VERSION);
}

#[test]
fn test_call_tool_params() {
    let params: CallToolParams =
        serde_json::from_value(json!({"name": "search_library", "arguments": {"q": "rust"}}))
            .unwrap();
    assert_eq!(params.name, "search_library");
    assert_eq!(params.arguments.unwrap()["q"], "rust");

    let bare: CallToolParams = serde_json::from_value(json!({"name": "get_collections"})).unwrap();
    assert!(bare.arguments.is_none());
}

#[test]
fn test_call_tool_result_serialization() {
    let result = CallToolResult::text("hello".to_string());
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        json!({"content": [{"type": "text", "text": "hello"}], "isError": false})
    );
}

#[test]
fn test_explicit_null_id_is_kept() {
    let request: JsonRpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
    assert_eq!(request.id, Some(serde_json::Value::Null));
    assert!(!request.is_notification());
}
