//! Server definition loading for toolscope.
//!
//! Reads the MCP server list from a config file with precedence:
//! CLI flag > `TOOLSCOPE_CONFIG` > Claude Desktop's default config location.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toolscope_mcp::client::DEFAULT_OPERATION_TIMEOUT_MS;
use toolscope_mcp::{McpConfig, ServerDefinition};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "TOOLSCOPE_CONFIG";

/// Environment variable overriding the per-operation timeout.
pub const TIMEOUT_ENV: &str = "TOOLSCOPE_TIMEOUT_MS";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("No MCP servers found in config {path}")]
    NoServers { path: String },

    #[error("No MCP server named '{name}' in config")]
    UnknownServer { name: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Resolved configuration for a toolscope run.
#[derive(Debug, Clone)]
pub struct ToolscopeConfig {
    pub config_path: PathBuf,
    pub servers: McpConfig,
    pub operation_timeout_ms: u64,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
}

/// On-disk layout of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// Claude Desktop style: `{"mcpServers": {...}}`.
    Json,
    /// `[servers.<name>]` tables.
    Toml,
}

impl ConfigFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

impl ToolscopeConfig {
    /// Load configuration from all sources, applying precedence rules.
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(overrides, |key| std::env::var_os(key))
    }

    /// Like [`load`](Self::load), reading environment variables through `env`.
    pub fn load_with_env(
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let config_path = overrides
            .config_path
            .or_else(|| env(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(default_config_path);

        let operation_timeout_ms = match overrides.timeout_ms {
            Some(ms) => ms,
            None => match env(TIMEOUT_ENV) {
                Some(raw) => parse_timeout(&raw)?,
                None => DEFAULT_OPERATION_TIMEOUT_MS,
            },
        };

        let servers = load_servers(&config_path)?;
        tracing::debug!(
            "Loaded {} MCP servers from {}",
            servers.servers.len(),
            config_path.display()
        );

        Ok(Self {
            config_path,
            servers,
            operation_timeout_ms,
        })
    }

    /// Definition of the server called `name`.
    pub fn server(&self, name: &str) -> Result<ServerDefinition, ConfigError> {
        self.servers
            .definition(name)
            .ok_or_else(|| ConfigError::UnknownServer {
                name: name.to_string(),
            })
    }
}

fn parse_timeout(raw: &OsString) -> Result<u64, ConfigError> {
    let raw = raw.to_string_lossy();
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: TIMEOUT_ENV.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

/// Claude Desktop's config file for the current platform.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Claude")
        .join("claude_desktop_config.json")
}

/// Read and parse a config file, requiring at least one server.
pub fn load_servers(path: &Path) -> Result<McpConfig, ConfigError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: display.clone(),
            }
        } else {
            ConfigError::Read {
                path: display.clone(),
                source: e,
            }
        }
    })?;

    let config = parse_servers(&content, ConfigFormat::for_path(path)).map_err(|message| {
        ConfigError::Parse {
            path: display.clone(),
            message,
        }
    })?;

    if config.servers.is_empty() {
        return Err(ConfigError::NoServers { path: display });
    }
    Ok(config)
}

/// Parse config text in the given format.
///
/// JSON is read as JSON5, so comments and trailing commas are accepted.
pub fn parse_servers(content: &str, format: ConfigFormat) -> Result<McpConfig, String> {
    match format {
        ConfigFormat::Json => json5::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    }
}
