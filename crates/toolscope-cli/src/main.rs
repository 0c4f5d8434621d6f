//! toolscope CLI: explore and call tools on MCP servers.

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use toolscope_config::{CliOverrides, ToolscopeConfig};
use toolscope_mcp::runtime::{check_runtime, runtime_complete};
use toolscope_mcp::{ArgValue, InvocationRequest, InvocationResult, McpClient, Resolver};

#[derive(Parser)]
#[command(name = "toolscope", version, about = "Explore and call tools on MCP servers")]
struct Cli {
    /// Path to the server config file (Claude Desktop JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Upper bound on a whole discovery or tool call, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured servers
    Servers,

    /// Connect to a server and list its tools, resources and prompts
    Discover {
        /// Server name from the config file
        server: String,

        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call one tool on a server
    Call {
        /// Server name from the config file
        server: String,

        /// Tool to call
        tool: String,

        /// Tool argument, coerced to the type the tool's schema declares
        #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        args: Vec<(String, String)>,

        /// Arguments as a JSON object; `--arg` entries override its keys
        #[arg(long, value_name = "JSON")]
        json_args: Option<String>,
    },

    /// Check the Node.js toolchain that npx-launched servers depend on
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let overrides = CliOverrides {
        config_path: cli.config,
        timeout_ms: cli.timeout_ms,
    };

    match cli.command {
        Command::Doctor => doctor().await,
        Command::Servers => {
            let config = load_config(overrides)?;
            let defs = config.servers.definitions();
            eprintln!(
                "Found {} MCP servers in {}",
                defs.len(),
                config.config_path.display()
            );
            print!("{}", render::server_list(&defs));
            Ok(())
        }
        Command::Discover { server, json } => {
            let config = load_config(overrides)?;
            let client = client_for(&config);
            let def = config.server(&server)?;
            eprintln!("Connecting to {server}...");
            let catalog = client
                .discover(&def)
                .await
                .with_context(|| format!("Failed to connect to '{server}'"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                print!("{}", render::catalog_summary(&catalog));
            }
            Ok(())
        }
        Command::Call {
            server,
            tool,
            args,
            json_args,
        } => {
            let config = load_config(overrides)?;
            let client = client_for(&config);
            let def = config.server(&server)?;
            let request = build_request(&tool, json_args.as_deref(), args)?;

            // Schema comes from a discovery session of its own
            let catalog = client
                .discover(&def)
                .await
                .with_context(|| format!("Failed to connect to '{server}'"))?;
            let descriptor = catalog
                .tool(&tool)
                .with_context(|| format!("Server '{server}' has no tool named '{tool}'"))?;

            eprintln!("Executing {tool}...");
            match client
                .invoke(&def, &request, descriptor.input_schema.as_ref())
                .await
            {
                InvocationResult::Text(text) => {
                    let mut out = io::stdout().lock();
                    writeln!(out, "{text}")?;
                    Ok(())
                }
                InvocationResult::Failure { kind, message } => {
                    anyhow::bail!("{kind}: {message}")
                }
            }
        }
    }
}

fn load_config(overrides: CliOverrides) -> Result<ToolscopeConfig> {
    ToolscopeConfig::load(overrides).context("Failed to load server configuration")
}

fn client_for(config: &ToolscopeConfig) -> McpClient {
    McpClient::new(Resolver::from_env())
        .with_operation_timeout(Duration::from_millis(config.operation_timeout_ms))
}

async fn doctor() -> Result<()> {
    let statuses = check_runtime(&Resolver::from_env()).await;
    print!("{}", render::runtime_status(&statuses));
    if !runtime_complete(&statuses) {
        eprintln!(
            "Warning: some Node.js components are missing. \
             MCP servers that depend on Node.js (using npx) will not work."
        );
    }
    Ok(())
}

/// Parse a `KEY=VALUE` pair; the value may itself contain `=`.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn build_request(
    tool: &str,
    json_args: Option<&str>,
    pairs: Vec<(String, String)>,
) -> Result<InvocationRequest> {
    let mut arguments: BTreeMap<String, ArgValue> = match json_args {
        Some(raw) => serde_json::from_str(raw)
            .context("--json-args must be an object of strings, numbers and booleans")?,
        None => BTreeMap::new(),
    };
    for (key, value) in pairs {
        arguments.insert(key, ArgValue::Text(value));
    }
    Ok(InvocationRequest {
        tool_name: tool.to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn call_arguments_parse() {
        let cli = Cli::try_parse_from([
            "toolscope",
            "--timeout-ms",
            "5000",
            "call",
            "web-tools",
            "ddg_search",
            "-a",
            "query=rust",
            "--arg",
            "max_results=5",
        ])
        .unwrap();
        assert_eq!(cli.timeout_ms, Some(5000));
        match cli.command {
            Command::Call {
                server, tool, args, ..
            } => {
                assert_eq!(server, "web-tools");
                assert_eq!(tool, "ddg_search");
                assert_eq!(args.len(), 2);
                assert_eq!(args[1], ("max_results".to_string(), "5".to_string()));
            }
            _ => panic!("Expected call"),
        }
    }

    #[test]
    fn pairs_override_json_args() {
        let request = build_request(
            "ddg_search",
            Some(r#"{"query": "old", "safe": true, "max_results": 3}"#),
            vec![("query".to_string(), "new".to_string())],
        )
        .unwrap();
        assert_eq!(request.arguments["query"], ArgValue::Text("new".into()));
        assert_eq!(request.arguments["safe"], ArgValue::Bool(true));
        assert_eq!(request.arguments["max_results"], ArgValue::from(3_i64));
    }

    #[test]
    fn nested_json_args_are_rejected() {
        assert!(build_request("t", Some(r#"{"a": {"b": 1}}"#), Vec::new()).is_err());
    }
}
