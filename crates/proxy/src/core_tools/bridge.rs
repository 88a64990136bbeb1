use std::pin::Pin;

use rmcp::model::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{input_schema, invalid_arguments, parse_arguments, resolution_error_result, CoreTool, CoreToolContext, CoreToolOutcome};

/// Resolves a bare or prefixed tool name and forwards the call to whichever
/// downstream server owns it.
pub struct BridgeToolRequest;

#[derive(Debug, Deserialize, JsonSchema)]
struct Request {
    /// The tool to invoke, either its prefixed name or a bare name
    /// resolvable through discovery.
    tool: String,
    /// Arguments forwarded verbatim to the downstream tool.
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

impl CoreTool for BridgeToolRequest {
    fn name(&self) -> &'static str {
        "bridge_tool_request"
    }

    fn descriptor(&self) -> Tool {
        Tool::new(
            self.name(),
            "Resolves a tool by name and forwards a call to it, returning its result.",
            input_schema::<Request>(),
        )
    }

    fn handle<'a>(
        &'a self,
        arguments: Option<Map<String, Value>>,
        context: &'a mut CoreToolContext<'_>,
    ) -> Pin<Box<dyn std::future::Future<Output = CoreToolOutcome> + Send + 'a>> {
        Box::pin(async move {
            let request: Request = match parse_arguments(arguments) {
                Ok(request) => request,
                Err(err) => return CoreToolOutcome::Result(invalid_arguments(err)),
            };

            // Resolution only needs the catalog, not the downstream call
            // itself: returning `Forward` here lets the caller release the
            // catalog lock before awaiting a potentially slow downstream
            // tool, instead of holding it for the call's whole duration.
            let resolved = match context.catalog.resolve(&request.tool, context.config) {
                Ok(resolved) => resolved,
                Err(err) => return CoreToolOutcome::Result(resolution_error_result(&err)),
            };

            CoreToolOutcome::Forward {
                session: resolved.session,
                original_name: resolved.original_name,
                arguments: request.arguments,
            }
        })
    }
}
