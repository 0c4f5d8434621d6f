//! Capability catalog: the tools, resources and prompts of one server.

use crate::error::McpError;
use crate::session::{ServerInfo, Session};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Upper bound on `nextCursor` pages followed per listing.
const MAX_PAGES: usize = 100;

/// Information about a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "mimeType")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// Everything one handshake with one server discovered.
///
/// Only meaningful for the server named in `server`; catalogs from different
/// servers or different connections are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCatalog {
    pub server: String,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
}

impl CapabilityCatalog {
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new", alias = "tools", alias = "resources", alias = "prompts")]
    items: Vec<T>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

/// Fetch the catalog over a ready session.
///
/// Tool listing must succeed; resources and prompts are optional on the
/// server side and fall back to empty lists.
pub async fn discover(session: &mut Session) -> Result<CapabilityCatalog, McpError> {
    let server = session.server_name().to_string();
    let server_info = session.server_info().cloned();
    let transport = session.begin_operation()?;

    let tools: Vec<ToolDescriptor> = list_all(transport, &server, "tools/list")
        .await
        .map_err(|e| McpError::ToolListFailed {
            server: server.clone(),
            reason: e.to_string(),
        })?;

    let resources = list_optional(transport, &server, "resources/list").await;
    let prompts = list_optional(transport, &server, "prompts/list").await;

    tracing::info!(
        "MCP server '{}' exposes {} tools, {} resources, {} prompts",
        server,
        tools.len(),
        resources.len(),
        prompts.len()
    );

    Ok(CapabilityCatalog {
        server,
        server_info,
        tools,
        resources,
        prompts,
    })
}

async fn list_optional<T: DeserializeOwned>(
    transport: &dyn Transport,
    server: &str,
    method: &str,
) -> Vec<T> {
    list_all(transport, server, method)
        .await
        .unwrap_or_else(|e| {
            tracing::debug!("'{method}' unavailable on MCP server '{server}': {e}");
            Vec::new()
        })
}

/// Run a paginated list request, concatenating pages in server order.
async fn list_all<T: DeserializeOwned>(
    transport: &dyn Transport,
    server: &str,
    method: &str,
) -> Result<Vec<T>, McpError> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let params = cursor
            .take()
            .map(|c| serde_json::json!({ "cursor": c }));
        let resp = transport.send_request(method, params).await?;

        if let Some(err) = resp.error {
            return Err(McpError::JsonRpc {
                server: server.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        let result = resp.result.ok_or_else(|| {
            McpError::Protocol(format!("{method} response has neither result nor error"))
        })?;
        let page: Page<T> = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse {method} response: {e}")))?;

        items.extend(page.items);
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(items),
        }
    }

    tracing::warn!("'{method}' on MCP server '{server}' exceeded {MAX_PAGES} pages, truncating");
    Ok(items)
}
