//! MCP client: one-shot discovery and invocation against configured servers.
//!
//! Every call opens its own session, runs exactly one operation and closes
//! the session again, so unrelated calls never share a server process.

use crate::catalog::{self, CapabilityCatalog};
use crate::config::ServerDefinition;
use crate::error::{ErrorKind, McpError};
use crate::invoke::{self, InvocationRequest, InvocationResult};
use crate::resolver::Resolver;
use crate::session::{Connector, Session};
use std::time::Duration;
use tokio::time::Instant;

/// Default bound on a whole discovery or invocation, spawn to close.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 60_000;

/// Client for discovering and calling tools on MCP servers.
#[derive(Debug, Clone)]
pub struct McpClient {
    connector: Connector,
    operation_timeout: Duration,
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new(Resolver::from_env())
    }
}

impl McpClient {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            connector: Connector::new(resolver),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    /// Connect to a server and fetch its capability catalog.
    pub async fn discover(&self, def: &ServerDefinition) -> Result<CapabilityCatalog, McpError> {
        let deadline = Instant::now() + self.operation_timeout;
        let mut session = self.open_before(def, deadline).await?;

        let operation = async {
            let result = catalog::discover(&mut session).await;
            session.close().await;
            result
        };

        tokio::time::timeout_at(deadline, operation)
            .await
            .unwrap_or_else(|_| Err(self.timed_out(def)))
    }

    /// Connect to a server and call one tool.
    ///
    /// `schema` is the tool's input schema from an earlier discovery; it
    /// drives argument coercion.
    pub async fn invoke(
        &self,
        def: &ServerDefinition,
        request: &InvocationRequest,
        schema: Option<&serde_json::Value>,
    ) -> InvocationResult {
        let deadline = Instant::now() + self.operation_timeout;
        let mut session = match self.open_before(def, deadline).await {
            Ok(session) => session,
            Err(e) => return InvocationResult::from_error(&e),
        };

        let operation = async {
            let result = invoke::invoke(&mut session, request, schema).await;
            session.close().await;
            result
        };

        match tokio::time::timeout_at(deadline, operation).await {
            Ok(result) => result,
            Err(_) => InvocationResult::Failure {
                kind: ErrorKind::ToolCallFailed,
                message: self.timed_out(def).to_string(),
            },
        }
    }

    /// Open a session, treating an expired deadline as a failed handshake.
    ///
    /// Dropping the unfinished open drops its transport, and `kill_on_drop`
    /// reaps the child.
    async fn open_before(
        &self,
        def: &ServerDefinition,
        deadline: Instant,
    ) -> Result<Session, McpError> {
        match tokio::time::timeout_at(deadline, self.connector.open(def)).await {
            Ok(opened) => opened,
            Err(_) => {
                tracing::warn!(
                    "MCP server '{}' did not finish the handshake within {:?}",
                    def.name,
                    self.operation_timeout
                );
                Err(McpError::HandshakeFailed {
                    server: def.name.clone(),
                    reason: format!(
                        "timed out after {}ms",
                        self.operation_timeout.as_millis()
                    ),
                })
            }
        }
    }

    fn timed_out(&self, def: &ServerDefinition) -> McpError {
        tracing::warn!(
            "Operation on MCP server '{}' exceeded {:?}, abandoning it",
            def.name,
            self.operation_timeout
        );
        McpError::Timeout {
            name: def.name.clone(),
            timeout_ms: self.operation_timeout.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_resolver() -> (tempfile::TempDir, Resolver) {
        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::from_env()
            .with_search_path(root.path())
            .with_home(None)
            .with_system_dirs(Vec::new());
        (root, resolver)
    }

    #[tokio::test]
    async fn discover_missing_executable() {
        let (_root, resolver) = empty_resolver();
        let client = McpClient::new(resolver);

        let err = client
            .discover(&ServerDefinition::new("gone", "no-such-server"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutableNotFound);
    }

    #[tokio::test]
    async fn invoke_missing_executable_keeps_kind() {
        let (_root, resolver) = empty_resolver();
        let client = McpClient::new(resolver);

        let result = client
            .invoke(
                &ServerDefinition::new("web", "npx"),
                &InvocationRequest::new("web_scrape"),
                None,
            )
            .await;
        match result {
            InvocationResult::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::ExecutableNotFound);
                assert!(message.contains("nodejs.org"));
            }
            other => panic!("Expected Failure, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_handshake_is_a_handshake_failure() {
        let client = McpClient::default().with_operation_timeout(Duration::from_millis(500));
        let def = ServerDefinition::new("hang", "sleep").with_args(["10"]);

        let started = std::time::Instant::now();
        let err = client.discover(&def).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
        assert!(err.to_string().contains("timed out after 500ms"));

        match client
            .invoke(&def, &InvocationRequest::new("say"), None)
            .await
        {
            InvocationResult::Failure { kind, .. } => assert_eq!(kind, ErrorKind::HandshakeFailed),
            other => panic!("Expected Failure, got: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<McpClient>();
    }
}
