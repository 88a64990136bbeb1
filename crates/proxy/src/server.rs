//! The aggregating proxy's `ServerHandler` implementation, startup sequence,
//! and external control-plane handle.

use std::{fs::OpenOptions, path::Path, process::Stdio, sync::Arc, time::Duration};

use config::ProxyConfig;
use futures_util::future::join_all;
use itertools::Itertools;
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, ErrorData, Implementation, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    Peer, RoleServer, ServerHandler, ServiceExt,
};
use tokio::sync::RwLock;

use crate::{
    catalog::Catalog,
    core_tools::{self, resolution_error_result, CoreTool, CoreToolContext, CoreToolOutcome},
    downstream::DownstreamSession,
};

/// Upper bound on how long shutdown waits for downstream sessions to close
/// before giving up and exiting anyway.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

struct State {
    catalog: Catalog,
    config: ProxyConfig,
}

/// The aggregating proxy: one `ServerHandler` presenting a single unified
/// tool catalog built from every ready downstream session, plus a fixed set
/// of core tools for discovery and dynamic toggling.
#[derive(Clone)]
pub struct Proxy {
    state: Arc<RwLock<State>>,
    core_tools: Arc<Vec<Box<dyn CoreTool>>>,
    peer: Arc<RwLock<Option<Peer<RoleServer>>>>,
    info: ServerInfo,
}

/// A patch to the mutable subset of [`ProxyConfig`] (the fields that can
/// change after startup without restarting the proxy).
#[derive(Debug, Default, Clone)]
pub struct ConfigPatch {
    /// `Some(new value)` replaces `exposeTools`; `None` leaves it untouched.
    pub expose_tools: Option<Option<Vec<String>>>,
    /// `Some(new value)` replaces `hideTools`; `None` leaves it untouched.
    pub hide_tools: Option<Option<Vec<String>>>,
    /// `Some(new value)` replaces `enableDynamicDiscovery`; `None` leaves it
    /// untouched.
    pub enable_dynamic_discovery: Option<bool>,
}

/// A read/write handle to a running [`Proxy`], usable from outside the MCP
/// request loop (a supervising process, a dashboard, a test harness).
#[derive(Clone)]
pub struct ProxyHandle {
    state: Arc<RwLock<State>>,
    peer: Arc<RwLock<Option<Peer<RoleServer>>>>,
}

impl ProxyHandle {
    /// Names of every downstream server that came up successfully.
    pub async fn ready_sessions(&self) -> Vec<String> {
        self.state.read().await.catalog.session_names()
    }

    /// The tools currently advertised in `tools/list` (downstream tools
    /// passing the filters and, when dynamic discovery is on, enabled; plus
    /// the active core tools).
    pub async fn list_tools(&self) -> Vec<Tool> {
        let state = self.state.read().await;
        state.catalog.list_downstream_tools(&state.config)
    }

    /// Applies a patch to the mutable subset of the configuration.
    pub async fn patch_config(&self, patch: ConfigPatch) {
        let mut state = self.state.write().await;

        if let Some(expose_tools) = patch.expose_tools {
            state.config.expose_tools = expose_tools;
        }
        if let Some(hide_tools) = patch.hide_tools {
            state.config.hide_tools = hide_tools;
        }
        if let Some(enable_dynamic_discovery) = patch.enable_dynamic_discovery {
            state.config.enable_dynamic_discovery = enable_dynamic_discovery;
        }

        drop(state);
        self.force_notify().await;
    }

    /// Sends a `tools/list_changed` notification immediately, regardless of
    /// whether anything actually changed.
    pub async fn force_notify(&self) {
        if let Some(peer) = self.peer.read().await.as_ref() {
            if let Err(err) = peer.notify_tool_list_changed().await {
                log::warn!("failed to send tools/list_changed notification: {err}");
            }
        }
    }
}

impl Proxy {
    /// Spawns every configured downstream server concurrently, preserving
    /// config declaration order when inserting into the catalog, and builds
    /// the fixed core tool set for this config.
    pub async fn start(config: ProxyConfig, run_id: &str, log_dir: &Path) -> anyhow::Result<Self> {
        let connects = config
            .servers
            .iter()
            .map(|spec| {
                let stderr = open_stderr_sink(log_dir, run_id, &spec.name);
                DownstreamSession::connect(spec, stderr)
            })
            .collect::<Vec<_>>();

        let results = join_all(connects).await;

        let mut catalog = Catalog::new();
        for result in results {
            match result {
                Ok(session) => catalog.add_session(session),
                Err(err) => log::warn!("{err}"),
            }
        }

        let core_tools = core_tools::registered_tools(&config);
        for core_tool in &core_tools {
            core_tool.on_init().await;
        }

        let server_info = Implementation {
            name: "mcp-funnel".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let info = ServerInfo {
            protocol_version: crate::PROTOCOL_VERSION,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            instructions: Some(instructions(&config)),
        };

        Ok(Self {
            state: Arc::new(RwLock::new(State { catalog, config })),
            core_tools: Arc::new(core_tools),
            peer: Arc::new(RwLock::new(None)),
            info,
        })
    }

    /// A control-plane handle that shares this proxy's state.
    pub fn handle(&self) -> ProxyHandle {
        ProxyHandle {
            state: self.state.clone(),
            peer: self.peer.clone(),
        }
    }

    /// Serves this proxy over stdio until the host disconnects or the
    /// process receives `SIGINT`, then shuts down every downstream session.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let (stdin, stdout) = rmcp::transport::io::stdio();
        let running = self.clone().serve((stdin, stdout)).await?;

        *self.peer.write().await = Some(running.peer().clone());

        tokio::select! {
            result = running.waiting() => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("received interrupt, shutting down");
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&self) {
        let sessions = self.state.write().await.catalog.take_sessions();

        let closes = sessions.into_iter().map(|session| async move {
            match Arc::try_unwrap(session) {
                Ok(session) => session.close().await,
                Err(session) => {
                    log::warn!("downstream server '{}' still has an active caller at shutdown; skipping close", session.name())
                }
            }
        });

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all(closes)).await.is_err() {
            log::warn!("timed out after {SHUTDOWN_TIMEOUT:?} waiting for downstream sessions to close");
        }

        for core_tool in self.core_tools.iter() {
            core_tool.on_destroy().await;
        }
    }
}

impl ServerHandler for Proxy {
    fn get_info(&self) -> ServerInfo {
        self.info.clone()
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let state = self.state.read().await;
        let mut tools = state.catalog.list_downstream_tools(&state.config);
        tools.extend(self.core_tools.iter().map(|tool| tool.descriptor()));

        Ok(ListToolsResult {
            next_cursor: None,
            tools,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Some(core_tool) = self.core_tools.iter().find(|tool| tool.name() == params.name.as_ref()) {
            let mut state = self.state.write().await;
            let State { catalog, config } = &mut *state;
            let mut context = CoreToolContext::new(config, catalog, core_tool.name());

            // `handle` only resolves/mutates the catalog here; it never
            // awaits a downstream call itself (see `CoreToolOutcome`), so
            // the write lock is held only for catalog bookkeeping, not for
            // however long a forwarded tool call takes.
            let outcome = core_tool.handle(params.arguments, &mut context).await;
            let mutated = context.mutated();

            drop(state);

            if mutated {
                if let Err(err) = ctx.peer.notify_tool_list_changed().await {
                    log::warn!("failed to send tools/list_changed notification: {err}");
                }
            }

            return match outcome {
                CoreToolOutcome::Result(result) => Ok(result),
                CoreToolOutcome::Forward {
                    session,
                    original_name,
                    arguments,
                } => match session.call(&original_name, arguments).await {
                    Ok(result) => Ok(result),
                    Err(err) => Ok(core_tools_error_result(&err)),
                },
            };
        }

        let state = self.state.read().await;

        let resolved = match state.catalog.resolve(&params.name, &state.config) {
            Ok(resolved) => resolved,
            Err(err) => return Ok(resolution_error_result(&err)),
        };

        let session = resolved.session.clone();
        let original_name = resolved.original_name.clone();
        drop(state);

        match session.call(&original_name, params.arguments).await {
            Ok(result) => Ok(result),
            Err(err) => Ok(core_tools_error_result(&err)),
        }
    }
}

fn core_tools_error_result(err: &crate::error::ProxyError) -> CallToolResult {
    use rmcp::model::Content;
    CallToolResult::error(vec![Content::text(err.to_string())])
}

fn open_stderr_sink(log_dir: &Path, run_id: &str, server_name: &str) -> Stdio {
    let path = log_dir.join(format!("run-{run_id}-{server_name}.stderr.log"));

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Stdio::from(file),
        Err(err) => {
            log::warn!("failed to open stderr log '{}' for '{server_name}': {err}", path.display());
            Stdio::null()
        }
    }
}

fn instructions(config: &ProxyConfig) -> String {
    let mut text = String::from(
        "This server aggregates tools from multiple downstream MCP servers behind one catalog. \
         Use discover_tools_by_words to find a tool by keyword, get_tool_schema to see its full \
         input schema, and bridge_tool_request to invoke it.",
    );

    if config.enable_dynamic_discovery {
        text.push_str(
            " Downstream tools are hidden from tools/list until loaded with load_toolset; \
             use unload_toolset to hide them again.",
        );
    }

    if !config.servers.is_empty() {
        let names = config.servers.iter().map(|server| server.name.as_str()).join(", ");
        text.push_str(&format!(" Configured servers: {names}."));
    }

    text
}
