//! The five core tools the proxy always exposes (four of them; the toolset
//! pair is gated on `enableDynamicDiscovery`): `discover_tools_by_words`,
//! `get_tool_schema`, `bridge_tool_request`, `load_toolset`, `unload_toolset`.

mod bridge;
mod discover;
mod schema;
mod toolset;

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use config::ProxyConfig;
use rmcp::model::{CallToolResult, Content, Tool};
use schemars::{schema_for, JsonSchema};
use serde_json::{Map, Value};

use crate::{catalog::Catalog, error::ProxyError, pattern};

pub use bridge::BridgeToolRequest;
pub use discover::DiscoverToolsByWords;
pub use schema::GetToolSchema;
pub use toolset::{LoadToolset, UnloadToolset};

/// Per-call mutable context handed to a core tool: the catalog it may
/// mutate, the config it reads, and whether this call changed the enable
/// set (which the caller uses to decide whether to emit a single coalesced
/// `tools/list_changed` notification after `handle` returns).
pub struct CoreToolContext<'a> {
    /// The active, merged configuration.
    pub config: &'a ProxyConfig,
    /// The catalog this call may resolve against or mutate.
    pub catalog: &'a mut Catalog,
    /// Name of the core tool being invoked, for log correlation only.
    log_target: &'static str,
    /// A per-process monotonic call id, for log correlation only.
    call_id: u64,
    mutated: bool,
}

static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

impl<'a> CoreToolContext<'a> {
    /// Builds a fresh context with no mutation recorded yet.
    pub fn new(config: &'a ProxyConfig, catalog: &'a mut Catalog, log_target: &'static str) -> Self {
        let call_id = CALL_COUNTER.fetch_add(1, Ordering::Relaxed);
        log::debug!("core tool '{log_target}' invoked (call #{call_id})");

        Self {
            config,
            catalog,
            log_target,
            call_id,
            mutated: false,
        }
    }

    /// Whether this call changed the enable set and a `tools/list_changed`
    /// notification should be sent.
    pub fn mutated(&self) -> bool {
        self.mutated
    }

    /// Resolves and enables each name in `names`. A name that fails to
    /// resolve is reported separately rather than aborting the whole call.
    /// Resolving to an already-enabled tool still counts as handled,
    /// not as a mutation.
    pub fn enable_tools(&mut self, names: &[String]) -> (Vec<String>, Vec<String>) {
        let mut enabled = Vec::new();
        let mut not_found = Vec::new();

        for name in names {
            match self.catalog.resolve(name, self.config) {
                Ok(resolved) => {
                    self.catalog.enable(&resolved.prefixed_name);
                    self.mutated = true;
                    enabled.push(resolved.prefixed_name);
                }
                Err(_) => not_found.push(name.clone()),
            }
        }

        log::debug!(
            "{}#{}: loaded {}, {} name(s) unresolved",
            self.log_target,
            self.call_id,
            enabled.len(),
            not_found.len()
        );

        (enabled, not_found)
    }

    /// Resolves and disables each name in `names`.
    pub fn disable_tools(&mut self, names: &[String]) -> (Vec<String>, Vec<String>) {
        let mut disabled = Vec::new();
        let mut not_found = Vec::new();

        for name in names {
            match self.catalog.resolve(name, self.config) {
                Ok(resolved) => {
                    if self.catalog.disable(&resolved.prefixed_name) {
                        self.mutated = true;
                    }
                    disabled.push(resolved.prefixed_name);
                }
                Err(_) => not_found.push(name.clone()),
            }
        }

        (disabled, not_found)
    }
}

/// What a core tool's `handle` wants done with its invocation.
///
/// A plain [`Result`](CoreToolOutcome::Result) is returned to the host as-is.
/// [`Forward`](CoreToolOutcome::Forward) asks the caller to invoke a resolved
/// downstream session *after* releasing whatever lock guarded the call to
/// `handle` itself, so a slow downstream tool never holds up the catalog for
/// unrelated `listTools`/`callTool` requests (only `bridge_tool_request`
/// produces this variant today).
pub enum CoreToolOutcome {
    /// The final result to return to the host.
    Result(CallToolResult),
    /// Forward to this session's original tool name with these arguments,
    /// outside of the lock `handle` ran under.
    Forward {
        /// The resolved live session to call.
        session: std::sync::Arc<crate::downstream::DownstreamSession>,
        /// The tool's original (unprefixed) name on that session.
        original_name: String,
        /// Arguments to forward verbatim.
        arguments: Option<Map<String, Value>>,
    },
}

/// One of the proxy's own tools, as opposed to a downstream tool forwarded
/// through the catalog.
pub trait CoreTool: Send + Sync {
    /// The tool's unprefixed name, as seen by the host.
    fn name(&self) -> &'static str;

    /// The tool's descriptor, advertised in `tools/list` alongside
    /// downstream tools.
    fn descriptor(&self) -> Tool;

    /// Whether this core tool is registered at all, given `exposeCoreTools`.
    /// An unset `exposeCoreTools` registers every core tool.
    fn is_enabled(&self, config: &ProxyConfig) -> bool {
        match &config.expose_core_tools {
            Some(patterns) => pattern::matches_any(self.name(), patterns.iter().map(String::as_str)),
            None => true,
        }
    }

    /// Handles an invocation, possibly mutating the catalog through
    /// `context`.
    fn handle<'a>(
        &'a self,
        arguments: Option<Map<String, Value>>,
        context: &'a mut CoreToolContext<'_>,
    ) -> std::pin::Pin<Box<dyn Future<Output = CoreToolOutcome> + Send + 'a>>;

    /// Runs once after this tool is registered, before the host transport
    /// opens. Default no-op.
    fn on_init<'a>(&'a self) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }

    /// Runs once at shutdown, before the host transport closes. Default
    /// no-op.
    fn on_destroy<'a>(&'a self) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

pub(crate) fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

pub(crate) fn error_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

pub(crate) fn invalid_arguments(source: serde_json::Error) -> CallToolResult {
    error_result(format!("invalid arguments: {source}"))
}

/// Renders `T`'s JSON schema as the object body a [`Tool`] expects for its
/// `input_schema` field.
pub(crate) fn input_schema<T: JsonSchema>() -> Map<String, Value> {
    let schema = serde_json::to_value(schema_for!(T)).expect("schema serializes to JSON");
    let Value::Object(schema) = schema else {
        unreachable!("schemars always produces an object schema");
    };
    schema
}

/// Parses a core tool's arguments into `T`, treating a missing argument map
/// as an empty object so tools with no required fields can be called bare.
pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: Option<Map<String, Value>>) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
}

/// Builds the list of core tools active for `config`: the four always-on
/// tools plus the dynamic-discovery-gated pair, filtered by
/// `exposeCoreTools`.
pub fn registered_tools(config: &ProxyConfig) -> Vec<Box<dyn CoreTool>> {
    let mut tools: Vec<Box<dyn CoreTool>> = vec![
        Box::new(DiscoverToolsByWords),
        Box::new(GetToolSchema),
        Box::new(BridgeToolRequest),
    ];

    if config.enable_dynamic_discovery {
        tools.push(Box::new(LoadToolset));
        tools.push(Box::new(UnloadToolset));
    }

    tools.retain(|tool| tool.is_enabled(config));
    tools
}

/// Converts a [`ProxyError`] surfaced while resolving a tool name into a
/// content-only `CallToolResult`, with a hint pointing back at discovery
/// where that's useful.
pub(crate) fn resolution_error_result(err: &ProxyError) -> CallToolResult {
    match err {
        ProxyError::NotFound(name) => error_result(format!(
            "no tool matches '{name}'. Call discover_tools_by_words or get_tool_schema to find the exact name."
        )),
        ProxyError::Ambiguous { name, candidates } => error_result(format!(
            "'{name}' matches multiple tools: {}",
            candidates.join(", ")
        )),
        other => error_result(other.to_string()),
    }
}
