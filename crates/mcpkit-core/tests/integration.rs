use mcpkit_core::{
    CallToolResult, ContentBlock, Implementation, JsonRpcErrorCode, JsonRpcErrorObject, Message,
    Request, RequestId, Response, ResourceTemplate, ServerCapabilities,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn initialize_request_serializes_expected_shape() {
    let req = Request::new(
        1,
        "initialize",
        Some(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "t", "version": "0" },
        })),
    );
    let encoded = serde_json::to_value(&req).unwrap();
    assert_eq!(encoded["method"], "initialize");
    assert_eq!(encoded["params"]["protocolVersion"], "2024-11-05");
}

#[test]
fn server_capabilities_omit_unset_fields() {
    let caps = ServerCapabilities::default();
    let encoded = serde_json::to_value(&caps).unwrap();
    assert_eq!(encoded, json!({}));
}

#[test]
fn implementation_round_trips() {
    let info = Implementation {
        name: "example-server".to_string(),
        version: "0.1.0".to_string(),
        title: None,
    };
    let encoded = serde_json::to_string(&info).unwrap();
    let decoded: Implementation = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, info);
}

#[test]
fn resource_template_detects_parameterization() {
    let template = ResourceTemplate {
        uri_template: "resource://mcp/user/{id}".to_string(),
        name: "user".to_string(),
        title: None,
        description: None,
        mime_type: None,
    };
    assert!(template.is_parameterized());

    let direct = ResourceTemplate {
        uri_template: "resource://mcp/status".to_string(),
        ..template
    };
    assert!(!direct.is_parameterized());
}

#[test]
fn call_tool_result_text_helper_matches_wire_shape() {
    let result = CallToolResult::text("hi");
    let encoded = serde_json::to_value(&result).unwrap();
    assert_eq!(
        encoded,
        json!({"content": [{"type": "text", "text": "hi"}], "isError": false})
    );
}

#[test]
fn message_dispatches_response_with_error_payload() {
    let response = Response::error(
        RequestId::Number(7),
        JsonRpcErrorObject::new(JsonRpcErrorCode::InvalidParams, "unknown tool"),
    );
    let message: Message = serde_json::from_value(serde_json::to_value(&response).unwrap())
        .expect("response round-trips through Message");
    match message {
        Message::Response(r) => assert!(r.is_error()),
        other => panic!("expected Response, got {other:?}"),
    }
}

#[test]
fn content_block_resource_variant_carries_text_contents() {
    let block = ContentBlock::Resource {
        resource: mcpkit_core::ResourceContents::Text {
            uri: "resource://mcp/readme".to_string(),
            mime_type: Some("text/plain".to_string()),
            text: "hello".to_string(),
        },
    };
    let encoded = serde_json::to_value(&block).unwrap();
    assert_eq!(encoded["type"], "resource");
    assert_eq!(encoded["resource"]["text"], "hello");
}
