//! The aggregated view over every downstream server's tools: filtering,
//! enable-set tracking, and name resolution.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use config::ProxyConfig;
use rmcp::model::Tool;

use crate::{downstream::DownstreamSession, error::ProxyError, index::ToolIndex, pattern};

/// Maximum number of candidate names reported in an [`ProxyError::Ambiguous`].
const MAX_AMBIGUOUS_CANDIDATES: usize = 5;

struct CatalogEntry {
    tool: Tool,
    server_name: String,
}

/// The outcome of resolving a bare or prefixed tool name to a concrete
/// downstream tool.
pub struct Resolved {
    /// The tool's catalog-wide prefixed name (`"<server>__<tool>"`).
    pub prefixed_name: String,
    /// The tool's name as the downstream server knows it.
    pub original_name: String,
    /// The live session to forward the call to.
    pub session: Arc<DownstreamSession>,
}

/// Aggregates every ready downstream session's tools into one catalog,
/// tracking which are currently enabled for discovery-gated exposure.
#[derive(Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index_by_name: HashMap<String, usize>,
    sessions: HashMap<String, Arc<DownstreamSession>>,
    enable_set: HashSet<String>,
}

impl Catalog {
    /// An empty catalog with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready session and indexes its tools under
    /// `"<serverName>__<toolName>"`. A tool whose prefixed name duplicates an
    /// already-catalogued one is skipped with a warning rather than shadowing
    /// or duplicating the existing record.
    pub fn add_session(&mut self, session: DownstreamSession) {
        let server_name = session.name().to_string();

        for tool in session.tools() {
            let prefixed_name = format!("{server_name}__{}", tool.name);

            if self.index_by_name.contains_key(&prefixed_name) {
                log::warn!("tool '{prefixed_name}' duplicates an existing catalog entry; skipping");
                continue;
            }

            let mut prefixed = tool.clone();
            prefixed.name = prefixed_name.clone().into();

            let idx = self.entries.len();
            self.entries.push(CatalogEntry {
                tool: prefixed,
                server_name: server_name.clone(),
            });
            self.index_by_name.insert(prefixed_name, idx);
        }

        self.sessions.insert(server_name, Arc::new(session));
    }

    /// Drops a server's session and every tool it contributed, evicting any
    /// of its tools from the enable set too.
    pub fn remove_session(&mut self, server_name: &str) {
        self.sessions.remove(server_name);

        let prefix = format!("{server_name}__");
        self.enable_set.retain(|name| !name.starts_with(&prefix));

        self.entries.retain(|entry| entry.server_name != server_name);

        self.index_by_name.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            self.index_by_name.insert(entry.tool.name.to_string(), idx);
        }
    }

    fn is_visible(&self, prefixed_name: &str, config: &ProxyConfig) -> bool {
        if let Some(hide) = &config.hide_tools {
            if pattern::matches_any(prefixed_name, hide.iter().map(String::as_str)) {
                return false;
            }
        }

        match &config.expose_tools {
            Some(expose) => pattern::matches_any(prefixed_name, expose.iter().map(String::as_str)),
            None => true,
        }
    }

    fn filtered_entries<'a>(&'a self, config: &'a ProxyConfig) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries.iter().filter(move |entry| self.is_visible(&entry.tool.name, config))
    }

    /// Tools visible under the catalog's filters AND currently enabled (or
    /// not subject to dynamic discovery at all).
    pub fn list_downstream_tools(&self, config: &ProxyConfig) -> Vec<Tool> {
        self.filtered_entries(config)
            .filter(|entry| !config.enable_dynamic_discovery || self.enable_set.contains(entry.tool.name.as_ref()))
            .map(|entry| entry.tool.clone())
            .collect()
    }

    /// Looks up a tool's descriptor by its exact prefixed name, ignoring the
    /// enable set and expose/hide filters. Used by `get_tool_schema`, which
    /// must be able to describe a tool before it's been loaded.
    pub fn tool_descriptor(&self, prefixed_name: &str) -> Option<&Tool> {
        self.index_by_name.get(prefixed_name).map(|&idx| &self.entries[idx].tool)
    }

    /// `(prefixedName, lowercased searchable text)` pairs for every
    /// filter-visible tool, used by `discover_tools_by_words`'s literal
    /// keyword ranking.
    pub fn searchable_entries(&self, config: &ProxyConfig) -> Vec<(&str, String)> {
        self.filtered_entries(config)
            .map(|entry| {
                let mut text = entry.tool.name.to_lowercase();
                if let Some(description) = &entry.tool.description {
                    text.push(' ');
                    text.push_str(&description.to_lowercase());
                }
                (entry.tool.name.as_ref(), text)
            })
            .collect()
    }

    /// Resolves `name` to a concrete downstream tool and its live session.
    ///
    /// Tries an exact `"<server>__<tool>"` lookup first; if that fails and
    /// `hackyDiscovery` is enabled, falls back to a fuzzy/substring search
    /// over the filter-visible catalog. Only tools passing the catalog's
    /// expose/hide filters are eligible; the enable set is not consulted
    /// here (enabling is a discovery-gate on `list_tools`, not a permission
    /// check on invocation).
    pub fn resolve(&self, name: &str, config: &ProxyConfig) -> Result<Resolved, ProxyError> {
        if let Some(resolved) = self.resolve_exact(name, config) {
            return Ok(resolved);
        }

        if config.hacky_discovery {
            return self.resolve_fuzzy(name, config);
        }

        Err(ProxyError::NotFound(name.to_string()))
    }

    fn resolve_exact(&self, name: &str, config: &ProxyConfig) -> Option<Resolved> {
        let &idx = self.index_by_name.get(name)?;
        let entry = &self.entries[idx];

        if !self.is_visible(&entry.tool.name, config) {
            return None;
        }

        self.resolved_from_entry(entry)
    }

    fn resolve_fuzzy(&self, name: &str, config: &ProxyConfig) -> Result<Resolved, ProxyError> {
        let mut index = ToolIndex::new().map_err(|source| ProxyError::Startup {
            server: "<index>".to_string(),
            source,
        })?;

        for entry in self.filtered_entries(config) {
            index.add_tool(&entry.tool).map_err(|source| ProxyError::Startup {
                server: "<index>".to_string(),
                source,
            })?;
        }

        index.commit().map_err(|source| ProxyError::Startup {
            server: "<index>".to_string(),
            source,
        })?;

        let hits = index.search([name]).map_err(|source| ProxyError::Startup {
            server: "<index>".to_string(),
            source,
        })?;

        match hits.len() {
            0 => Err(ProxyError::NotFound(name.to_string())),
            1 => {
                let &idx = self
                    .index_by_name
                    .get(hits[0].prefixed_name.as_str())
                    .expect("fuzzy hit must reference an indexed entry");
                self.resolved_from_entry(&self.entries[idx])
                    .ok_or_else(|| ProxyError::NotFound(name.to_string()))
            }
            _ => Err(ProxyError::Ambiguous {
                name: name.to_string(),
                candidates: hits.into_iter().take(MAX_AMBIGUOUS_CANDIDATES).map(|hit| hit.prefixed_name).collect(),
            }),
        }
    }

    fn resolved_from_entry(&self, entry: &CatalogEntry) -> Option<Resolved> {
        let session = self.sessions.get(&entry.server_name)?.clone();
        let original_name = entry.tool.name.strip_prefix(&format!("{}__", entry.server_name))?.to_string();

        Some(Resolved {
            prefixed_name: entry.tool.name.to_string(),
            original_name,
            session,
        })
    }

    /// Adds a prefixed name to the enable set. No-op if already enabled.
    pub fn enable(&mut self, prefixed_name: &str) {
        self.enable_set.insert(prefixed_name.to_string());
    }

    /// Removes a prefixed name from the enable set. Returns whether it was
    /// present.
    pub fn disable(&mut self, prefixed_name: &str) -> bool {
        self.enable_set.remove(prefixed_name)
    }

    /// Names of every currently registered downstream server.
    pub fn session_names(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Drops every session and the tools it contributed from the catalog,
    /// handing their session handles back to the caller so it can close
    /// them concurrently (and under its own timeout) without holding the
    /// catalog lock for the whole shutdown.
    pub fn take_sessions(&mut self) -> Vec<Arc<DownstreamSession>> {
        self.entries.clear();
        self.index_by_name.clear();
        self.enable_set.clear();
        self.sessions.drain().map(|(_, session)| session).collect()
    }
}
