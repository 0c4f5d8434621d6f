//! End-to-end tests against a shell-script MCP server.
//!
//! The server in `ECHO_TOOL` answers `initialize`, `tools/list` and
//! `tools/call` and rejects everything else with "Method not found", which
//! exercises the best-effort resource and prompt listing.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use toolscope_mcp::{
    ErrorKind, InvocationRequest, InvocationResult, McpClient, Resolver, ServerDefinition,
};

const ECHO_TOOL: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":\([0-9]*\),.*/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"echo-tool","version":"0.1.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"say","description":"Echo text back","inputSchema":{"type":"object","properties":{"text":{"type":"string"}},"required":["text"]}},{"name":"count","inputSchema":{"type":"object","properties":{"count":{"type":"integer"}}}}]}}\n' "$id" ;;
    *'"name":"slow"'*)
      sleep 5 ;;
    *'"name":"greet"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"hello %s"}]}}\n' "$id" "$GREETING" ;;
    *'"name":"count"'*)
      case "$line" in
        *'"count":3'*) kind=number ;;
        *) kind=other ;;
      esac
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$kind" ;;
    *'"method":"tools/call"'*)
      text=$(printf '%s' "$line" | sed -n 's/.*"text":"\([^"]*\)".*/\1/p')
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$text" ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id" ;;
  esac
done
"#;

fn install_echo_tool(dir: &Path) {
    let path = dir.join("echo-tool");
    std::fs::write(&path, ECHO_TOOL).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn client_for(dir: &Path) -> McpClient {
    let resolver = Resolver::from_env()
        .with_search_path(dir)
        .with_home(None)
        .with_system_dirs(Vec::new());
    McpClient::new(resolver)
}

fn echo_server() -> ServerDefinition {
    ServerDefinition::new("echo", "echo-tool").with_timeout_ms(5000)
}

#[tokio::test]
async fn say_hi_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    install_echo_tool(dir.path());
    let client = client_for(dir.path());

    let result = client
        .invoke(
            &echo_server(),
            &InvocationRequest::new("say").with_arg("text", "hi"),
            None,
        )
        .await;
    assert_eq!(result, InvocationResult::Text("hi".into()));
}

#[tokio::test]
async fn discovery_survives_missing_resources_and_prompts() {
    let dir = tempfile::tempdir().unwrap();
    install_echo_tool(dir.path());
    let client = client_for(dir.path());

    let catalog = client.discover(&echo_server()).await.unwrap();
    assert_eq!(catalog.server, "echo");
    assert_eq!(catalog.server_info.unwrap().name, "echo-tool");
    let names: Vec<_> = catalog.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["say", "count"]);
    assert_eq!(catalog.tools[0].description.as_deref(), Some("Echo text back"));
    assert!(catalog.resources.is_empty());
    assert!(catalog.prompts.is_empty());
}

#[tokio::test]
async fn discovered_schema_drives_coercion() {
    let dir = tempfile::tempdir().unwrap();
    install_echo_tool(dir.path());
    let client = client_for(dir.path());
    let def = echo_server();

    let catalog = client.discover(&def).await.unwrap();
    let schema = catalog.tool("count").unwrap().input_schema.clone();

    let result = client
        .invoke(
            &def,
            &InvocationRequest::new("count").with_arg("count", "3"),
            schema.as_ref(),
        )
        .await;
    assert_eq!(result, InvocationResult::Text("number".into()));
}

#[tokio::test]
async fn concurrent_invocations_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    install_echo_tool(dir.path());
    let client = client_for(dir.path());
    let def = echo_server();
    let schema = json!({"type": "object", "properties": {"text": {"type": "string"}}});

    let alpha = InvocationRequest::new("say").with_arg("text", "alpha");
    let beta = InvocationRequest::new("say").with_arg("text", "beta");
    let (a, b) = tokio::join!(
        client.invoke(&def, &alpha, Some(&schema)),
        client.invoke(&def, &beta, Some(&schema)),
    );

    assert_eq!(a, InvocationResult::Text("alpha".into()));
    assert_eq!(b, InvocationResult::Text("beta".into()));
}

#[tokio::test]
async fn env_is_layered_over_parent_environment() {
    let dir = tempfile::tempdir().unwrap();
    install_echo_tool(dir.path());
    let client = client_for(dir.path());
    let def = echo_server().with_env("GREETING", "operator");

    let result = client
        .invoke(&def, &InvocationRequest::new("greet"), None)
        .await;
    assert_eq!(result, InvocationResult::Text("hello operator".into()));
}

#[tokio::test]
async fn hung_call_is_bounded_by_operation_timeout() {
    let dir = tempfile::tempdir().unwrap();
    install_echo_tool(dir.path());
    let client = client_for(dir.path()).with_operation_timeout(Duration::from_millis(500));

    let started = std::time::Instant::now();
    let result = client
        .invoke(&echo_server(), &InvocationRequest::new("slow"), None)
        .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    match result {
        InvocationResult::Failure { kind, message } => {
            assert_eq!(kind, ErrorKind::ToolCallFailed);
            assert!(message.contains("timed out"));
        }
        other => panic!("Expected Failure, got: {other:?}"),
    }
}

#[tokio::test]
async fn server_that_exits_fails_the_handshake() {
    let client = McpClient::default();
    let def = ServerDefinition::new("quitter", "sh").with_args(["-c", "exit 0"]);

    let err = client.discover(&def).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
}
