//! In-process scenario tests exercising the `Catalog` and core-tool suite
//! against a fake downstream server connected over an in-memory duplex
//! transport — no real child process is spawned. Covers the numbered
//! scenarios from the testable-properties list.

use config::ProxyConfig;
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, ErrorData, ListToolsResult, PaginatedRequestParam, RawContent, Tool,
    },
    service::RequestContext,
    RoleServer, ServerHandler, ServiceExt,
};
use serde_json::Map;

use crate::{
    catalog::Catalog,
    core_tools::{self, CoreTool, CoreToolContext, CoreToolOutcome},
    downstream::DownstreamSession,
    error::ProxyError,
};

#[derive(Clone)]
struct FakeDownstream {
    tools: Vec<Tool>,
}

impl ServerHandler for FakeDownstream {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.tools.clone(),
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(format!("{} acknowledged", params.name))]))
    }
}

fn fake_tool(name: &str) -> Tool {
    Tool::new(name.to_string(), format!("fakes {name}"), Map::new())
}

/// Connects a `DownstreamSession` to an in-process `FakeDownstream` over a
/// pair of in-memory duplex pipes, mirroring a real stdio handshake without
/// spawning a child process.
async fn connect_fake(name: &str, tools: Vec<Tool>) -> DownstreamSession {
    let (client_duplex, server_duplex) = tokio::io::duplex(8192);
    let (client_read, client_write) = tokio::io::split(client_duplex);
    let (server_read, server_write) = tokio::io::split(server_duplex);

    tokio::spawn(async move {
        if let Ok(running) = (FakeDownstream { tools }).serve((server_read, server_write)).await {
            let _ = running.waiting().await;
        }
    });

    DownstreamSession::connect_with_transport(name, (client_read, client_write))
        .await
        .expect("fake downstream connects over an in-memory duplex transport")
}

fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|content| match &content.raw {
            RawContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn config_with(hide: Option<&[&str]>, expose: Option<&[&str]>, dynamic: bool, hacky: bool) -> ProxyConfig {
    ProxyConfig {
        servers: Vec::new(),
        expose_tools: expose.map(|patterns| patterns.iter().map(|s| s.to_string()).collect()),
        hide_tools: hide.map(|patterns| patterns.iter().map(|s| s.to_string()).collect()),
        enable_dynamic_discovery: dynamic,
        hacky_discovery: hacky,
        expose_core_tools: None,
    }
}

/// Scenarios 1-6 from the testable-properties list, run against one catalog
/// built from two fake downstream servers that both expose `create_issue`
/// and `read_note`.
#[tokio::test]
async fn catalog_scenarios() {
    let github = connect_fake("github", vec![fake_tool("create_issue"), fake_tool("read_note")]).await;
    let memory = connect_fake("memory", vec![fake_tool("create_issue"), fake_tool("read_note")]).await;

    let mut catalog = Catalog::new();
    catalog.add_session(github);
    catalog.add_session(memory);

    // 1: no filters, every tool appears under its server's prefix.
    let unfiltered = config_with(None, None, false, false);
    let mut names: Vec<String> = catalog.list_downstream_tools(&unfiltered).iter().map(|tool| tool.name.to_string()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["github__create_issue", "github__read_note", "memory__create_issue", "memory__read_note"]
    );

    // 2: hideTools excludes a whole server; resolving a hidden name fails.
    let hidden = config_with(Some(&["github__*"]), None, false, false);
    assert!(catalog.list_downstream_tools(&hidden).iter().all(|tool| !tool.name.starts_with("github__")));
    assert!(matches!(catalog.resolve("github__create_issue", &hidden), Err(ProxyError::NotFound(_))));

    // 3: dynamic discovery hides everything until explicitly loaded.
    let dynamic = config_with(None, None, true, false);
    assert!(catalog.list_downstream_tools(&dynamic).is_empty());

    catalog.enable("memory__read_note");
    let loaded: Vec<String> = catalog.list_downstream_tools(&dynamic).iter().map(|tool| tool.name.to_string()).collect();
    assert_eq!(loaded, vec!["memory__read_note"]);

    // 4: get_tool_schema's lookup (tool_descriptor) ignores the enable set.
    assert!(catalog.tool_descriptor("github__create_issue").is_some());

    // 5: bridge_tool_request against an unknown name returns a content-only
    // error carrying both the failure and the discovery hint.
    let plain = config_with(None, None, false, false);
    let mut context = CoreToolContext::new(&plain, &mut catalog, "test");
    let bridge = core_tools::BridgeToolRequest;
    let args = serde_json::json!({ "tool": "nosuch" }).as_object().cloned();
    let CoreToolOutcome::Result(result) = bridge.handle(args, &mut context).await else {
        panic!("resolving an unknown tool must not produce a Forward outcome");
    };
    assert_eq!(result.is_error, Some(true));
    let text = result_text(&result);
    assert!(text.contains("no tool matches"));
    assert!(text.contains("discover_tools_by_words"));
    assert!(!context.mutated());

    // 6: hackyDiscovery surfaces an ambiguous match with both candidates.
    let hacky = config_with(None, None, false, true);
    let resolved = catalog.resolve("create_issue", &hacky);
    assert!(matches!(resolved, Err(ProxyError::Ambiguous { .. })));
    if let Err(ProxyError::Ambiguous { candidates, .. }) = resolved {
        assert_eq!(candidates.len(), 2);
    }
}

/// Enabling a tool through `load_toolset` resolves a bare name via the
/// catalog and records a mutation so the caller knows to emit
/// `tools/list_changed`.
#[tokio::test]
async fn load_toolset_enables_and_records_mutation() {
    let memory = connect_fake("memory", vec![fake_tool("read_note")]).await;

    let mut catalog = Catalog::new();
    catalog.add_session(memory);

    let dynamic = config_with(None, None, true, false);
    let mut context = CoreToolContext::new(&dynamic, &mut catalog, "test");

    let (enabled, not_found) = context.enable_tools(&["memory__read_note".to_string()]);
    assert_eq!(enabled, vec!["memory__read_note"]);
    assert!(not_found.is_empty());
    assert!(context.mutated());

    drop(context);
    let names: Vec<String> = catalog.list_downstream_tools(&dynamic).iter().map(|tool| tool.name.to_string()).collect();
    assert_eq!(names, vec!["memory__read_note"]);
}

/// Removing a session evicts its tools from both the catalog and the enable
/// set, per the invariant in §3.
#[tokio::test]
async fn removing_a_session_evicts_its_tools() {
    let github = connect_fake("github", vec![fake_tool("create_issue")]).await;
    let memory = connect_fake("memory", vec![fake_tool("read_note")]).await;

    let mut catalog = Catalog::new();
    catalog.add_session(github);
    catalog.add_session(memory);
    catalog.enable("github__create_issue");

    catalog.remove_session("github");

    let dynamic = config_with(None, None, true, false);
    catalog.enable("memory__read_note");
    let names: Vec<String> = catalog.list_downstream_tools(&dynamic).iter().map(|tool| tool.name.to_string()).collect();

    assert_eq!(names, vec!["memory__read_note"]);
    assert!(catalog.tool_descriptor("github__create_issue").is_none());
    assert!(matches!(catalog.resolve("github__create_issue", &config_with(None, None, false, false)), Err(ProxyError::NotFound(_))));
}

/// A downstream server reporting the same original tool name twice
/// contributes only the first record; the duplicate is skipped rather than
/// shadowing it or appearing twice in the listing.
#[tokio::test]
async fn duplicate_original_name_from_one_server_is_skipped() {
    let github = connect_fake("github", vec![fake_tool("read_note"), fake_tool("read_note")]).await;

    let mut catalog = Catalog::new();
    catalog.add_session(github);

    let unfiltered = config_with(None, None, false, false);
    let names: Vec<String> = catalog.list_downstream_tools(&unfiltered).iter().map(|tool| tool.name.to_string()).collect();

    assert_eq!(names, vec!["github__read_note"]);
}

/// `bridge_tool_request` resolves against the catalog and returns a
/// `Forward` outcome instead of awaiting the downstream call itself, so the
/// caller can release the catalog lock before the (potentially slow)
/// downstream call happens.
#[tokio::test]
async fn bridge_tool_request_forwards_after_resolving() {
    let memory = connect_fake("memory", vec![fake_tool("read_note")]).await;

    let mut catalog = Catalog::new();
    catalog.add_session(memory);

    let plain = config_with(None, None, false, false);
    let mut context = CoreToolContext::new(&plain, &mut catalog, "test");
    let bridge = core_tools::BridgeToolRequest;
    let args = serde_json::json!({ "tool": "memory__read_note" }).as_object().cloned();

    let CoreToolOutcome::Forward {
        session,
        original_name,
        arguments,
    } = bridge.handle(args, &mut context).await
    else {
        panic!("resolving a known tool must produce a Forward outcome, not an inline Result");
    };
    assert!(!context.mutated());
    assert_eq!(original_name, "read_note");

    let result = session.call(&original_name, arguments).await.unwrap();
    assert_eq!(result_text(&result), "read_note acknowledged");
}

/// `get_tool_schema` goes through the same resolution algorithm as
/// `bridge_tool_request`: a tool hidden by `hideTools` is not
/// schema-discoverable, and a bare name resolves via `hackyDiscovery` fuzzy
/// matching just like bridging does.
#[tokio::test]
async fn get_tool_schema_respects_filters_and_hacky_discovery() {
    let github = connect_fake("github", vec![fake_tool("create_issue")]).await;

    let mut catalog = Catalog::new();
    catalog.add_session(github);
    let schema = core_tools::GetToolSchema;

    let hidden = config_with(Some(&["github__*"]), None, false, false);
    let mut context = CoreToolContext::new(&hidden, &mut catalog, "test");
    let args = serde_json::json!({ "tool": "github__create_issue" }).as_object().cloned();
    let CoreToolOutcome::Result(result) = schema.handle(args, &mut context).await else {
        panic!("get_tool_schema never forwards");
    };
    assert_eq!(result.is_error, Some(true));
    drop(context);

    let hacky = config_with(None, None, false, true);
    let mut context = CoreToolContext::new(&hacky, &mut catalog, "test");
    let args = serde_json::json!({ "tool": "create_issue" }).as_object().cloned();
    let CoreToolOutcome::Result(result) = schema.handle(args, &mut context).await else {
        panic!("get_tool_schema never forwards");
    };
    assert_ne!(result.is_error, Some(true));
    assert!(result_text(&result).contains("github__create_issue"));
}
