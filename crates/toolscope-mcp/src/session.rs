//! Connection manager: one subprocess-backed session per operation.
//!
//! A session moves `Idle → Resolving → Spawning → Handshaking → Ready`, serves
//! exactly one operation (a catalog fetch or a tool call) and is then closed.
//! Any failure before `Ready` is absorbing and surfaces as an error from
//! [`Connector::open`].

use crate::config::ServerDefinition;
use crate::error::McpError;
use crate::resolver::{Resolver, missing_command_hint};
use crate::transport::{StdioTransport, Transport};
use serde::{Deserialize, Serialize};

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Spawning,
    Handshaking,
    Ready,
    Closed,
    Failed,
}

/// Name and version the server reported during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Deserialize)]
struct InitializeResult {
    #[serde(default, rename = "protocolVersion")]
    protocol_version: Option<String>,
    #[serde(default, rename = "serverInfo")]
    server_info: Option<ServerInfo>,
}

fn transition(server: &str, state: SessionState) {
    tracing::debug!("MCP session '{server}' -> {state:?}");
}

/// A ready, handshaken connection to one MCP server.
pub struct Session {
    server: String,
    transport: Box<dyn Transport>,
    server_info: Option<ServerInfo>,
    protocol_version: Option<String>,
    spent: bool,
}

impl Session {
    /// Run the initialization exchange over an already-connected transport.
    ///
    /// On failure the transport is shut down before the error is returned.
    pub async fn handshake(
        server: impl Into<String>,
        transport: Box<dyn Transport>,
    ) -> Result<Self, McpError> {
        let server = server.into();
        transition(&server, SessionState::Handshaking);

        match initialize(transport.as_ref()).await {
            Ok(init) => {
                transition(&server, SessionState::Ready);
                Ok(Self {
                    server,
                    transport,
                    server_info: init.server_info,
                    protocol_version: init.protocol_version,
                    spent: false,
                })
            }
            Err(reason) => {
                transition(&server, SessionState::Failed);
                transport.shutdown().await;
                Err(McpError::HandshakeFailed { server, reason })
            }
        }
    }

    /// Name of the server definition this session was opened for.
    pub fn server_name(&self) -> &str {
        &self.server
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Protocol version the server agreed to, if it reported one.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Whether the session's single operation has been used.
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Claim the session's single operation.
    pub(crate) fn begin_operation(&mut self) -> Result<&dyn Transport, McpError> {
        if self.spent {
            return Err(McpError::SessionSpent {
                server: self.server.clone(),
            });
        }
        self.spent = true;
        Ok(self.transport.as_ref())
    }

    /// Terminate the transport and the server process.
    pub async fn close(self) {
        self.transport.shutdown().await;
        transition(&self.server, SessionState::Closed);
    }
}

async fn initialize(transport: &dyn Transport) -> Result<InitializeResult, String> {
    let init_params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "toolscope",
            "version": env!("CARGO_PKG_VERSION")
        }
    });

    let resp = transport
        .send_request("initialize", Some(init_params))
        .await
        .map_err(|e| e.to_string())?;

    if let Some(err) = resp.error {
        return Err(format!("initialize rejected (code {}): {}", err.code, err.message));
    }
    let result = resp
        .result
        .ok_or_else(|| "initialize response has neither result nor error".to_string())?;
    let init: InitializeResult = serde_json::from_value(result)
        .map_err(|e| format!("malformed initialize result: {e}"))?;

    transport
        .send_notification("notifications/initialized", None)
        .await
        .map_err(|e| e.to_string())?;

    Ok(init)
}

/// Opens sessions for server definitions.
#[derive(Debug, Clone, Default)]
pub struct Connector {
    resolver: Resolver,
}

impl Connector {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve, spawn and handshake a server.
    pub async fn open(&self, def: &ServerDefinition) -> Result<Session, McpError> {
        transition(&def.name, SessionState::Idle);
        transition(&def.name, SessionState::Resolving);
        let Some(exe) = self.resolver.resolve(&def.command) else {
            transition(&def.name, SessionState::Failed);
            return Err(McpError::ExecutableNotFound {
                command: def.command.clone(),
                hint: missing_command_hint(&def.command),
            });
        };

        transition(&def.name, SessionState::Spawning);
        tracing::info!(
            "Starting MCP server '{}': {} {:?}",
            def.name,
            exe.absolute_path.display(),
            def.args
        );
        let transport = StdioTransport::spawn(
            &def.name,
            &exe.absolute_path,
            &def.args,
            &def.env,
            def.timeout_ms,
        )
        .inspect_err(|_| transition(&def.name, SessionState::Failed))?;

        Session::handshake(def.name.clone(), Box::new(transport)).await
    }
}
