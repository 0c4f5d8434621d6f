//! MCP (Model Context Protocol) capability discovery and tool invocation.
//!
//! Servers are stdio child processes speaking newline-delimited JSON-RPC 2.0.
//! Each discovery or tool call resolves the server's executable, spawns it,
//! performs the handshake, runs that single operation and shuts the process
//! down again.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod invoke;
pub mod jsonrpc;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod transport;

#[cfg(test)]
mod mock;

pub use catalog::{
    CapabilityCatalog, PromptArgument, PromptDescriptor, ResourceDescriptor, ToolDescriptor,
    discover,
};
pub use client::McpClient;
pub use config::{McpConfig, McpServerConfig, ServerDefinition};
pub use error::{ErrorKind, McpError};
pub use invoke::{ArgValue, InvocationRequest, InvocationResult, invoke};
pub use resolver::{ResolvedExecutable, Resolver};
pub use session::{Connector, ServerInfo, Session, SessionState};
pub use transport::{StdioTransport, Transport};
