//! Configuration types for MCP servers.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

fn default_timeout() -> u64 {
    30000
}

/// Top-level MCP configuration.
///
/// Accepts both the `[servers.<name>]` TOML layout and the `mcpServers`
/// object used by Claude Desktop's JSON config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default, alias = "mcpServers", deserialize_with = "launchable_servers")]
    pub servers: BTreeMap<String, McpServerConfig>,
}

/// Configuration for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to run (e.g., "npx", "python").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Timeout for requests in milliseconds (default: 30000).
    #[serde(default = "default_timeout", alias = "timeoutMs")]
    pub timeout_ms: u64,
}

/// A server entry as written on disk; URL-based entries have no command.
#[derive(Deserialize)]
struct RawServerConfig {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default = "default_timeout", alias = "timeoutMs")]
    timeout_ms: u64,
}

/// Keep only the entries that can be launched over stdio.
fn launchable_servers<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, McpServerConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, RawServerConfig>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, server)| {
            let Some(command) = server.command else {
                tracing::warn!("Skipping MCP server '{name}': no command to launch");
                return None;
            };
            let config = McpServerConfig {
                command,
                args: server.args,
                env: server.env,
                timeout_ms: server.timeout_ms,
            };
            Some((name, config))
        })
        .collect())
}

/// A named server, ready to be handed to the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDefinition {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout_ms: u64,
}

impl ServerDefinition {
    /// Definition with no arguments, no extra environment and the default timeout.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout_ms: default_timeout(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl McpConfig {
    /// Look up one server by name.
    pub fn definition(&self, name: &str) -> Option<ServerDefinition> {
        self.servers
            .get(name)
            .map(|server| server.to_definition(name))
    }

    /// All configured servers, ordered by name.
    pub fn definitions(&self) -> Vec<ServerDefinition> {
        self.servers
            .iter()
            .map(|(name, server)| server.to_definition(name))
            .collect()
    }
}

impl McpServerConfig {
    pub fn to_definition(&self, name: &str) -> ServerDefinition {
        ServerDefinition {
            name: name.to_string(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}
