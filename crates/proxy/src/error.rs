//! Error kinds produced by catalog resolution and downstream invocation.

/// Errors raised by the catalog and downstream sessions.
///
/// `ConfigError` (fatal at startup) lives in the `config` crate; these are
/// the runtime kinds described in the core's error handling design.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A downstream session failed during spawn, handshake, or the initial
    /// `tools/list`. Non-fatal: the session is dropped and the proxy
    /// continues with whichever other sessions came up.
    #[error("downstream server '{server}' failed to start: {source}")]
    Startup {
        /// Name of the server that failed to start.
        server: String,
        /// Underlying cause (spawn, handshake, or listing failure).
        #[source]
        source: anyhow::Error,
    },

    /// Resolution found no matching tool.
    #[error("no tool matches '{0}'")]
    NotFound(String),

    /// Resolution (via hacky discovery) matched more than one tool.
    #[error("'{name}' matches multiple tools: {candidates:?}")]
    Ambiguous {
        /// The name that was being resolved.
        name: String,
        /// Up to a small fixed number of matching prefixed names.
        candidates: Vec<String>,
    },

    /// The downstream server rejected the tool call.
    #[error("tool '{tool}' was rejected by its server: {message}")]
    ToolInvocation {
        /// Prefixed name of the tool that was invoked.
        tool: String,
        /// Error message reported by the downstream server.
        message: String,
    },

    /// The downstream process is no longer running.
    #[error("downstream server '{0}' is no longer running")]
    SessionClosed(String),
}
