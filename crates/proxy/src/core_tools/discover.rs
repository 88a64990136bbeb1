use std::pin::Pin;

use rmcp::model::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{error_result, input_schema, invalid_arguments, parse_arguments, text_result, CoreTool, CoreToolContext, CoreToolOutcome};

/// Ranks every filter-visible tool by how many distinct query keywords
/// appear in its name or description.
pub struct DiscoverToolsByWords;

#[derive(Debug, Deserialize, JsonSchema)]
struct Request {
    /// Space- or comma-separated keywords to search for.
    keywords: String,
}

impl CoreTool for DiscoverToolsByWords {
    fn name(&self) -> &'static str {
        "discover_tools_by_words"
    }

    fn descriptor(&self) -> Tool {
        Tool::new(
            self.name(),
            "Finds tools whose name or description contain the given keywords, ranked by how many distinct keywords matched.",
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

            let keywords: Vec<String> = request
                .keywords
                .split(|c: char| c.is_whitespace() || c == ',')
                .map(|word| word.trim().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect();

            if keywords.is_empty() {
                return CoreToolOutcome::Result(error_result("keywords must contain at least one word"));
            }

            let entries = context.catalog.searchable_entries(context.config);

            let mut ranked: Vec<(&str, usize)> = entries
                .iter()
                .map(|(name, text)| {
                    let hits = keywords.iter().filter(|keyword| text.contains(keyword.as_str())).count();
                    (*name, hits)
                })
                .filter(|(_, hits)| *hits > 0)
                .collect();

            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

            if ranked.is_empty() {
                return CoreToolOutcome::Result(text_result("0 tool(s) matched\n"));
            }

            let mut out = format!("{} tool(s) matched\n", ranked.len());
            for (name, _) in ranked {
                let description = context
                    .catalog
                    .tool_descriptor(name)
                    .and_then(|tool| tool.description.as_deref())
                    .unwrap_or_default();
                out.push_str(&format!("{name}: {description}\n"));
            }

            CoreToolOutcome::Result(text_result(out))
        })
    }
}
