//! Fuzzy/substring tool search backed by an in-memory tantivy index.
//!
//! Used only by the catalog's resolution algorithm when `hackyDiscovery` is
//! enabled and a bare tool name didn't resolve exactly; the literal
//! keyword-ranking search behind `discover_tools_by_words` is implemented
//! directly against the catalog's description cache instead, since its
//! ranking rule (distinct keyword hits, lexicographic tiebreak) is exactly
//! specified rather than a relevance score.

use std::collections::HashSet;

use convert_case::Boundary;
use rmcp::model::Tool;
use serde_json::{Map, Value};
use tantivy::{
    collector::TopDocs,
    doc,
    query::{BooleanQuery, BoostQuery, DisjunctionMaxQuery, FuzzyTermQuery, Occur, Query, TermQuery},
    schema::{Field, IndexRecordOption, Schema, Value as _, STORED, TEXT},
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
};

const HEAP_SIZE: usize = 15 * 1024 * 1024;
const TOP_DOCS_LIMIT: usize = 20;
const MAX_RESULTS: usize = 10;

/// A short-lived search index built fresh from whichever catalog entries are
/// currently visible to a resolution attempt.
pub struct ToolIndex {
    reader: IndexReader,
    writer: IndexWriter,
    fields: IndexFields,
}

struct IndexFields {
    tool_name: Field,
    server_name: Field,
    description: Field,
    input_params: Field,
    search_tokens: Field,
    prefixed_name: Field,
}

/// One fuzzy-search hit.
pub struct SearchResult {
    /// The matching tool's prefixed name (`"<server>__<tool>"`).
    pub prefixed_name: String,
    /// Relevance score; higher is more relevant.
    pub score: f32,
}

impl ToolIndex {
    /// Builds an empty index with the tool/server/description/schema schema
    /// used for fuzzy resolution.
    pub fn new() -> anyhow::Result<Self> {
        let mut builder = Schema::builder();

        let fields = IndexFields {
            tool_name: builder.add_text_field("tool_name", TEXT | STORED),
            server_name: builder.add_text_field("server_name", TEXT | STORED),
            description: builder.add_text_field("description", TEXT | STORED),
            input_params: builder.add_text_field("input_params", TEXT | STORED),
            search_tokens: builder.add_text_field("search_tokens", TEXT | STORED),
            prefixed_name: builder.add_text_field("prefixed_name", STORED),
        };

        let schema = builder.build();
        let index = Index::create_in_ram(schema);
        let reader = index.reader()?;
        let writer = index.writer(HEAP_SIZE)?;

        Ok(Self { reader, writer, fields })
    }

    /// Indexes a single already-prefixed tool descriptor.
    pub fn add_tool(&mut self, tool: &Tool) -> anyhow::Result<()> {
        let Some((server_name, tool_name)) = tool.name.split_once("__") else {
            return Err(anyhow::anyhow!("tool name '{}' is missing its server prefix", tool.name));
        };

        let mut doc = doc!(
            self.fields.tool_name => tool_name,
            self.fields.server_name => server_name,
            self.fields.prefixed_name => tool.name.as_ref(),
        );

        if let Some(description) = &tool.description {
            doc.add_text(self.fields.description, description);
        }

        if !tool.input_schema.is_empty() {
            doc.add_text(self.fields.input_params, serde_json::to_string(&tool.input_schema)?);
        }

        let search_tokens = generate_search_tokens(server_name, tool_name, tool.description.as_deref(), &tool.input_schema);
        doc.add_text(self.fields.search_tokens, &search_tokens);

        self.writer.add_document(doc)?;

        Ok(())
    }

    /// Commits pending documents and reloads the reader so they're
    /// searchable.
    pub fn commit(&mut self) -> anyhow::Result<()> {
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Searches across all fields for `keywords`, combining exact and fuzzy
    /// term queries with per-field boosts.
    pub fn search<'a, I>(&self, keywords: I) -> anyhow::Result<Vec<SearchResult>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let searcher = self.reader.searcher();
        let query = self.build_query(keywords)?;

        let top_docs = searcher.search(&query, &TopDocs::with_limit(TOP_DOCS_LIMIT))?;

        let mut results = Vec::with_capacity(MAX_RESULTS);
        let mut seen = HashSet::new();

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;

            let Some(prefixed_name) = doc.get_first(self.fields.prefixed_name).and_then(|v| v.as_str()) else {
                continue;
            };

            if seen.insert(prefixed_name.to_string()) {
                results.push(SearchResult {
                    prefixed_name: prefixed_name.to_string(),
                    score,
                });

                if results.len() >= MAX_RESULTS {
                    break;
                }
            }
        }

        Ok(results)
    }

    fn build_query<'a>(&self, keywords: impl IntoIterator<Item = &'a str>) -> anyhow::Result<Box<dyn Query>> {
        let mut main_queries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for keyword in keywords {
            for term in parse_query_terms(keyword) {
                let use_fuzzy = term.len() > 4 && !term.chars().all(|c| c.is_ascii_digit());

                let mut term_queries: Vec<Box<dyn Query>> = Vec::new();
                self.add_exact_term_queries(&term, &mut term_queries);

                if use_fuzzy {
                    self.add_fuzzy_term_queries(&term, &mut term_queries);
                }

                if !term_queries.is_empty() {
                    main_queries.push((Occur::Should, Box::new(DisjunctionMaxQuery::new(term_queries))));
                }
            }
        }

        Ok(Box::new(BooleanQuery::new(main_queries)))
    }

    fn add_exact_term_queries(&self, term: &str, queries: &mut Vec<Box<dyn Query>>) {
        let important_fields = [
            (self.fields.tool_name, 3.0),
            (self.fields.description, 1.2),
            (self.fields.server_name, 0.8),
        ];

        for (field, boost) in important_fields {
            let term_obj = Term::from_field_text(field, term);
            let query = Box::new(BoostQuery::new(Box::new(TermQuery::new(term_obj, IndexRecordOption::Basic)), boost));
            queries.push(query);
        }
    }

    fn add_fuzzy_term_queries(&self, term: &str, queries: &mut Vec<Box<dyn Query>>) {
        let fuzzy_fields = [
            (self.fields.description, 0.6),
            (self.fields.input_params, 0.4),
            (self.fields.search_tokens, 0.3),
        ];

        for (field, boost) in fuzzy_fields {
            let term_obj = Term::from_field_text(field, term);
            let fuzzy_query = Box::new(FuzzyTermQuery::new(term_obj, 1, true));
            queries.push(Box::new(BoostQuery::new(fuzzy_query, boost)));
        }
    }
}

fn generate_search_tokens(server_name: &str, tool_name: &str, description: Option<&str>, input_schema: &Map<String, Value>) -> String {
    let mut tokens = tokenize_name(server_name);
    tokens.extend(tokenize_name(tool_name));

    if let Some(description) = description {
        tokens.push(description.to_lowercase());
    }

    tokens.extend(tokenize_map(input_schema));
    tokens.join(" ")
}

fn tokenize_map(map: &Map<String, Value>) -> Vec<String> {
    let mut tokens = Vec::new();

    for (key, value) in map {
        tokens.extend(tokenize_name(key));

        if let Value::Object(nested) = value {
            tokens.extend(tokenize_map(nested));
        }
    }

    tokens
}

fn tokenize_name(name: &str) -> Vec<String> {
    convert_case::split(&name, &Boundary::defaults())
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty() && s.len() > 1)
        .collect()
}

fn parse_query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .flat_map(|term| convert_case::split(&term, &Boundary::defaults()).into_iter().map(|s| s.trim().to_lowercase()))
        .filter(|s| !s.is_empty() && s.len() > 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, description: &str) -> Tool {
        Tool::new(name.to_string(), description.to_string(), Map::new())
    }

    #[test]
    fn finds_exact_token_match() {
        let mut index = ToolIndex::new().unwrap();
        index.add_tool(&tool("github__create_issue", "Opens a new issue")).unwrap();
        index.add_tool(&tool("memory__read_note", "Reads a stored note")).unwrap();
        index.commit().unwrap();

        let results = index.search(["create_issue"]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].prefixed_name, "github__create_issue");
    }

    #[test]
    fn finds_both_ambiguous_candidates() {
        let mut index = ToolIndex::new().unwrap();
        index.add_tool(&tool("github__create_issue", "Opens a new issue")).unwrap();
        index.add_tool(&tool("memory__create_issue", "Logs an issue")).unwrap();
        index.commit().unwrap();

        let results = index.search(["create_issue"]).unwrap();
        assert_eq!(results.len(), 2);
    }
}
