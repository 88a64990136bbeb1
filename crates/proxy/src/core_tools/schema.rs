use std::pin::Pin;

use rmcp::model::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{
    error_result, input_schema, invalid_arguments, parse_arguments, resolution_error_result, text_result, CoreTool, CoreToolContext,
    CoreToolOutcome,
};

/// Returns a tool's full descriptor (name, description, input schema) so a
/// host can construct a well-formed `bridge_tool_request` call.
pub struct GetToolSchema;

#[derive(Debug, Deserialize, JsonSchema)]
struct Request {
    /// The tool's prefixed name, e.g. `"github__create_issue"`.
    tool: String,
}

impl CoreTool for GetToolSchema {
    fn name(&self) -> &'static str {
        "get_tool_schema"
    }

    fn descriptor(&self) -> Tool {
        Tool::new(
            self.name(),
            "Returns the full descriptor (name, description, input schema) for one catalogued tool.",
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

            let resolved = match context.catalog.resolve(&request.tool, context.config) {
                Ok(resolved) => resolved,
                Err(err) => return CoreToolOutcome::Result(resolution_error_result(&err)),
            };

            let tool = context
                .catalog
                .tool_descriptor(&resolved.prefixed_name)
                .expect("a name resolve() returned must still be in the catalog");

            CoreToolOutcome::Result(match serde_json::to_string_pretty(tool) {
                Ok(json) => text_result(json),
                Err(err) => error_result(format!("failed to serialize tool descriptor: {err}")),
            })
        })
    }
}
