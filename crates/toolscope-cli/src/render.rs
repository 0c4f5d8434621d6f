//! Plain-text rendering of configs, catalogs and runtime status.

use std::fmt::Write;
use toolscope_mcp::runtime::ToolStatus;
use toolscope_mcp::{CapabilityCatalog, ServerDefinition};

pub fn server_list(defs: &[ServerDefinition]) -> String {
    let mut out = String::new();
    for def in defs {
        let _ = write!(out, "{}: {}", def.name, def.command);
        for arg in &def.args {
            let _ = write!(out, " {arg}");
        }
        let _ = writeln!(out);
    }
    out
}

pub fn catalog_summary(catalog: &CapabilityCatalog) -> String {
    let mut out = String::new();
    match &catalog.server_info {
        Some(info) => {
            let version = info.version.as_deref().unwrap_or("unknown version");
            let _ = writeln!(out, "Connected to: {} ({} {})", catalog.server, info.name, version);
        }
        None => {
            let _ = writeln!(out, "Connected to: {}", catalog.server);
        }
    }

    let _ = writeln!(out, "\nTools ({}):", catalog.tools.len());
    for tool in &catalog.tools {
        let description = tool
            .description
            .as_deref()
            .unwrap_or("No description provided");
        let _ = writeln!(out, "  {}: {}", tool.name, first_line(description));
        match &tool.input_schema {
            Some(schema) => {
                let pretty = serde_json::to_string_pretty(schema).unwrap_or_default();
                for line in pretty.lines() {
                    let _ = writeln!(out, "      {line}");
                }
            }
            None => {
                let _ = writeln!(out, "      (no input schema)");
            }
        }
    }

    if !catalog.resources.is_empty() {
        let _ = writeln!(out, "\nResources ({}):", catalog.resources.len());
        for resource in &catalog.resources {
            let _ = writeln!(out, "  {}: {}", resource.name, resource.uri);
            if let Some(description) = &resource.description {
                let _ = writeln!(out, "      {}", first_line(description));
            }
        }
    }

    if !catalog.prompts.is_empty() {
        let _ = writeln!(out, "\nPrompts ({}):", catalog.prompts.len());
        for prompt in &catalog.prompts {
            let _ = writeln!(out, "  {}", prompt.name);
            if let Some(description) = &prompt.description {
                let _ = writeln!(out, "      {}", first_line(description));
            }
        }
    }
    out
}

pub fn runtime_status(statuses: &[ToolStatus]) -> String {
    let mut out = String::new();
    for status in statuses {
        match (&status.path, &status.version) {
            (Some(path), Some(version)) => {
                let _ = writeln!(out, "ok       {} {} ({})", status.name, version, path.display());
            }
            (Some(path), None) => {
                let _ = writeln!(out, "ok       {} ({})", status.name, path.display());
            }
            (None, _) => {
                let _ = writeln!(out, "missing  {}", status.name);
            }
        }
    }
    out
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use toolscope_mcp::{ResourceDescriptor, ServerInfo, ToolDescriptor};

    #[test]
    fn server_list_shows_command_line() {
        let defs = vec![
            ServerDefinition::new("web-tools", "python").with_args(["/srv/server.py"]),
            ServerDefinition::new("bare", "echo-tool"),
        ];
        assert_eq!(
            server_list(&defs),
            "web-tools: python /srv/server.py\nbare: echo-tool\n"
        );
    }

    #[test]
    fn catalog_lists_tools_and_resources() {
        let catalog = CapabilityCatalog {
            server: "web".into(),
            server_info: Some(ServerInfo {
                name: "Web Tools".into(),
                version: Some("1.0".into()),
            }),
            tools: vec![
                ToolDescriptor {
                    name: "web_scrape".into(),
                    description: Some("\n    Fetch a URL as markdown.\n    More detail.".into()),
                    input_schema: Some(json!({"type": "object"})),
                },
                ToolDescriptor {
                    name: "noop".into(),
                    description: None,
                    input_schema: None,
                },
            ],
            resources: vec![ResourceDescriptor {
                name: "readme".into(),
                uri: "file:///readme.md".into(),
                description: None,
                mime_type: None,
            }],
            prompts: Vec::new(),
        };

        let text = catalog_summary(&catalog);
        assert!(text.starts_with("Connected to: web (Web Tools 1.0)"));
        assert!(text.contains("  web_scrape: Fetch a URL as markdown.\n"));
        assert!(text.contains("  noop: No description provided\n      (no input schema)"));
        assert!(text.contains("Resources (1):\n  readme: file:///readme.md"));
        assert!(!text.contains("Prompts"));
    }

    #[test]
    fn runtime_status_lines() {
        let statuses = vec![
            ToolStatus {
                name: "node".into(),
                path: Some(PathBuf::from("/usr/bin/node")),
                version: Some("v20.11.0".into()),
            },
            ToolStatus {
                name: "npx".into(),
                path: None,
                version: None,
            },
        ];
        assert_eq!(
            runtime_status(&statuses),
            "ok       node v20.11.0 (/usr/bin/node)\nmissing  npx\n"
        );
    }
}
