use std::pin::Pin;

use rmcp::model::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{invalid_arguments, parse_arguments, text_result, CoreTool, CoreToolContext, CoreToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
struct Request {
    /// Tool names to resolve and load or unload, either prefixed or bare.
    tools: Vec<String>,
}

fn summary(verb: &str, acted: &[String], not_found: &[String]) -> String {
    let mut out = format!("{} {} tool(s)\n", verb, acted.len());
    for name in acted {
        out.push_str(&format!("{name}\n"));
    }
    if !not_found.is_empty() {
        out.push_str(&format!("{} name(s) did not resolve to a tool:\n", not_found.len()));
        for name in not_found {
            out.push_str(&format!("{name}\n"));
        }
    }
    out
}

/// Adds tools to the enable set, making them appear in `tools/list`. Only
/// registered when `enableDynamicDiscovery` is set.
pub struct LoadToolset;

impl CoreTool for LoadToolset {
    fn name(&self) -> &'static str {
        "load_toolset"
    }

    fn descriptor(&self) -> Tool {
        Tool::new(
            self.name(),
            "Enables the given tools so they appear in tools/list.",
            super::input_schema::<Request>(),
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

            let (loaded, not_found) = context.enable_tools(&request.tools);
            CoreToolOutcome::Result(text_result(summary("loaded", &loaded, &not_found)))
        })
    }
}

/// Removes tools from the enable set. Only registered when
/// `enableDynamicDiscovery` is set.
pub struct UnloadToolset;

impl CoreTool for UnloadToolset {
    fn name(&self) -> &'static str {
        "unload_toolset"
    }

    fn descriptor(&self) -> Tool {
        Tool::new(
            self.name(),
            "Disables the given tools so they no longer appear in tools/list.",
            super::input_schema::<Request>(),
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

            let (unloaded, not_found) = context.disable_tools(&request.tools);
            CoreToolOutcome::Result(text_result(summary("unloaded", &unloaded, &not_found)))
        })
    }
}
