//! Typed configuration for the aggregating proxy.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// A single downstream MCP server to spawn and aggregate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSpec {
    /// Unique identifier for this server. Used as the tool-name prefix.
    pub name: String,

    /// Executable to spawn.
    pub command: String,

    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables overlaid onto the proxy's own environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ServerSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyServerName);
        }
        if self.name.contains("__") {
            return Err(ConfigError::ReservedSeparator(self.name.clone()));
        }
        Ok(())
    }
}

/// Top-level configuration for the aggregating proxy.
///
/// This is the type a config file deserializes into, after the deep-merge
/// pass described by the loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawProxyConfig")]
pub struct ProxyConfig {
    /// Downstream servers to spawn, in declaration order.
    pub servers: Vec<ServerSpec>,

    /// Only tools matching one of these patterns are exposed, when set.
    pub expose_tools: Option<Vec<String>>,

    /// Tools matching one of these patterns are never exposed, even if they
    /// also match `expose_tools`.
    pub hide_tools: Option<Vec<String>>,

    /// When set, downstream tools are hidden until explicitly enabled through
    /// the core tool suite.
    pub enable_dynamic_discovery: bool,

    /// When set, the discovery core tool also does fuzzy/substring matching
    /// against tool and server names, not just exact word ranking.
    pub hacky_discovery: bool,

    /// Only core tools matching one of these patterns are registered, when
    /// set.
    pub expose_core_tools: Option<Vec<String>>,
}

impl TryFrom<RawProxyConfig> for ProxyConfig {
    type Error = ConfigError;

    fn try_from(raw: RawProxyConfig) -> Result<Self, ConfigError> {
        let mut seen = std::collections::BTreeSet::new();
        for server in &raw.servers {
            server.validate()?;
            if !seen.insert(server.name.clone()) {
                return Err(ConfigError::DuplicateServer(server.name.clone()));
            }
        }

        Ok(Self {
            servers: raw.servers,
            expose_tools: raw.expose_tools,
            hide_tools: raw.hide_tools,
            enable_dynamic_discovery: raw.enable_dynamic_discovery,
            hacky_discovery: raw.hacky_discovery,
            expose_core_tools: raw.expose_core_tools,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawProxyConfig {
    #[serde(default)]
    servers: Vec<ServerSpec>,
    #[serde(default)]
    expose_tools: Option<Vec<String>>,
    #[serde(default)]
    hide_tools: Option<Vec<String>>,
    #[serde(default)]
    enable_dynamic_discovery: bool,
    #[serde(default)]
    hacky_discovery: bool,
    #[serde(default)]
    expose_core_tools: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn parses_minimal_config() {
        let json = indoc! {r#"
            {
                "servers": [
                    { "name": "github", "command": "github-mcp-server" }
                ]
            }
        "#};

        let config: ProxyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "github");
        assert!(config.servers[0].args.is_empty());
        assert!(!config.enable_dynamic_discovery);
    }

    #[test]
    fn rejects_duplicate_server_names() {
        let json = indoc! {r#"
            {
                "servers": [
                    { "name": "a", "command": "x" },
                    { "name": "a", "command": "y" }
                ]
            }
        "#};

        let err = serde_json::from_str::<ProxyConfig>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate server name"));
    }

    #[test]
    fn rejects_reserved_separator_in_name() {
        let json = indoc! {r#"
            {
                "servers": [
                    { "name": "git__hub", "command": "x" }
                ]
            }
        "#};

        let err = serde_json::from_str::<ProxyConfig>(json).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = indoc! {r#"
            {
                "servers": [],
                "typo": true
            }
        "#};

        assert!(serde_json::from_str::<ProxyConfig>(json).is_err());
    }

    #[test]
    fn parses_full_config() {
        let json = indoc! {r#"
            {
                "servers": [
                    { "name": "github", "command": "github-mcp-server", "args": ["--stdio"], "env": { "TOKEN": "x" } }
                ],
                "exposeTools": ["github__*"],
                "hideTools": ["github__delete_*"],
                "enableDynamicDiscovery": true,
                "hackyDiscovery": true,
                "exposeCoreTools": ["discover_tools_by_words"]
            }
        "#};

        let config: ProxyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.servers[0].env.get("TOKEN").unwrap(), "x");
        assert_eq!(config.expose_tools.unwrap(), vec!["github__*"]);
        assert_eq!(config.hide_tools.unwrap(), vec!["github__delete_*"]);
        assert!(config.enable_dynamic_discovery);
        assert!(config.hacky_discovery);
        assert_eq!(
            config.expose_core_tools.unwrap(),
            vec!["discover_tools_by_words"]
        );
    }
}
