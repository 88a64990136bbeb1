use std::process::Stdio;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

use rmcp::{
    model::{CallToolRequestParam, CallToolResult, Tool},
    service::RunningService,
    RoleClient, ServiceExt,
};
use tokio::process::Command;

use crate::error::ProxyError;

/// A live MCP client session to one downstream server, communicating with
/// its child process over stdio.
///
/// Owns the `rmcp` client service for the lifetime of the session; the
/// process's stdin/stdout carry the MCP wire protocol, its stderr is
/// redirected elsewhere (the caller supplies where).
pub struct DownstreamSession {
    name: String,
    service: RunningService<RoleClient, ()>,
    tools: Vec<Tool>,
}

impl DownstreamSession {
    /// Spawns `spec.command` with `spec.args`, overlaying `spec.env` onto
    /// the proxy's own environment, performs the `initialize` handshake,
    /// and fetches the server's tool list.
    ///
    /// `stderr` is attached to the child's stderr stream; the caller decides
    /// where it's redirected (a per-run log file in production, a pipe in
    /// tests).
    pub async fn connect(spec: &config::ServerSpec, stderr: Stdio) -> Result<Self, ProxyError> {
        Self::connect_inner(spec, stderr)
            .await
            .map_err(|source| ProxyError::Startup {
                server: spec.name.clone(),
                source,
            })
    }

    async fn connect_inner(spec: &config::ServerSpec, stderr: Stdio) -> anyhow::Result<Self> {
        log::debug!("spawning downstream server '{}': {} {:?}", spec.name, spec.command, spec.args);

        let mut command = Command::new(&spec.command);
        command.args(&spec.args);

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        // Run the child in its own process group so `close()` can terminate
        // the whole subtree instead of just the immediate child.
        #[cfg(unix)]
        command.process_group(0);

        let transport = rmcp::transport::TokioChildProcess::builder(command)
            .stderr(stderr)
            .spawn()
            .map(|(transport, _stderr)| transport)?;

        let service = ().serve(transport).await?;
        let tools = service.list_tools(Default::default()).await?.tools;

        log::info!("downstream server '{}' ready with {} tool(s)", spec.name, tools.len());

        Ok(Self {
            name: spec.name.clone(),
            service,
            tools,
        })
    }

    /// The server name this session was configured under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tool list captured when this session reached ready. Does not
    /// re-query the downstream server.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Forwards a call to the downstream server using its original
    /// (unprefixed) tool name.
    pub async fn call(
        &self,
        original_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, ProxyError> {
        let params = CallToolRequestParam {
            name: original_name.to_string().into(),
            arguments,
        };

        match self.service.call_tool(params).await {
            Ok(result) => Ok(result),
            Err(rmcp::ServiceError::McpError(error)) => Err(ProxyError::ToolInvocation {
                tool: format!("{}__{original_name}", self.name),
                message: error.message.to_string(),
            }),
            Err(other) => {
                log::warn!("downstream server '{}' is unreachable: {other}", self.name);
                Err(ProxyError::SessionClosed(self.name.clone()))
            }
        }
    }

    /// Shuts down the MCP client and, if still alive, the child process.
    pub async fn close(self) {
        if let Err(err) = self.service.cancel().await {
            log::warn!("error while closing downstream server '{}': {err}", self.name);
        }
    }
}

#[cfg(test)]
impl DownstreamSession {
    /// Builds a session over an already-open transport instead of spawning a
    /// child process, so catalog/resolution tests can exercise a real `rmcp`
    /// client/server handshake against an in-process fake downstream.
    pub(crate) async fn connect_with_transport(
        name: impl Into<String>,
        transport: (tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>),
    ) -> anyhow::Result<Self> {
        let service = ().serve(transport).await?;
        let tools = service.list_tools(Default::default()).await?.tools;

        Ok(Self {
            name: name.into(),
            service,
            tools,
        })
    }
}
