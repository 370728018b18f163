//! Tools the personas may call during a tool-use loop.

use crate::knowledge::{KnowledgeStore, MetadataFilter};
use crate::locale::Language;
use claude::{Tool, ToolResult};
use serde_json::{json, Value};

pub const SEARCH_KNOWLEDGE: &str = "search_knowledge";

const DEFAULT_LIMIT: usize = 3;
const MAX_LIMIT: usize = 10;

pub struct PlatformTools;

impl PlatformTools {
    pub fn all() -> Vec<Tool> {
        vec![Self::search_knowledge()]
    }

    fn search_knowledge() -> Tool {
        Tool {
            name: SEARCH_KNOWLEDGE.to_string(),
            description: "Search the philosophical knowledge base for passages relevant to a query. \
                Results are in the conversation language."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of passages (1-10, default 3)",
                        "minimum": 1,
                        "maximum": 10
                    }
                },
                "required": ["query"]
            }),
        }
    }
}

/// Run the tool `name` with `input`.
pub fn execute(name: &str, input: &Value, store: &KnowledgeStore, language: Language) -> ToolResult {
    match name {
        SEARCH_KNOWLEDGE => search(input, store, language),
        _ => ToolResult::error(format!("Unknown tool: {name}")),
    }
}

fn search(input: &Value, store: &KnowledgeStore, language: Language) -> ToolResult {
    let Some(query) = input["query"].as_str().filter(|q| !q.trim().is_empty()) else {
        return ToolResult::error("Missing required parameter: query");
    };
    let limit = input["limit"]
        .as_u64()
        .map_or(DEFAULT_LIMIT, |n| (n as usize).clamp(1, MAX_LIMIT));

    let hits = store.query(query, Some(&MetadataFilter::lang(language.code())), limit);
    tracing::debug!(query, hits = hits.len(), lang = %language, "search_knowledge");

    if hits.is_empty() {
        return ToolResult::success(format!("No passages found for \"{query}\"."));
    }
    ToolResult::success(format_passages(&hits))
}

/// Render hits as `[id] (score)` headed passages.
pub fn format_passages(hits: &[crate::knowledge::SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("[{}] (score {:.2})\n{}", hit.document.id, hit.score, hit.document.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KnowledgeStore {
        KnowledgeStore::seeded().unwrap()
    }

    #[test]
    fn test_search_is_language_filtered() {
        let result = execute(
            SEARCH_KNOWLEDGE,
            &json!({"query": "Gödel incompleteness Unvollständigkeitssätze", "limit": 10}),
            &store(),
            Language::De,
        );
        assert!(!result.is_error);
        assert!(result.content.contains("[de_goedel_unvollstaendigkeit]"));
        assert!(!result.content.contains("[en_"));
    }

    #[test]
    fn test_limit_is_clamped() {
        let result = execute(
            SEARCH_KNOWLEDGE,
            &json!({"query": "truth theory system", "limit": 1}),
            &store(),
            Language::En,
        );
        assert_eq!(result.content.matches("(score ").count(), 1);
    }

    #[test]
    fn test_missing_query() {
        let result = execute(SEARCH_KNOWLEDGE, &json!({}), &store(), Language::En);
        assert!(result.is_error);
    }

    #[test]
    fn test_no_hits() {
        let result = execute(
            SEARCH_KNOWLEDGE,
            &json!({"query": "zzzqqq"}),
            &KnowledgeStore::new(),
            Language::En,
        );
        assert!(!result.is_error);
        assert!(result.content.starts_with("No passages found"));
    }

    #[test]
    fn test_unknown_tool() {
        let result = execute("roll_dice", &json!({}), &store(), Language::En);
        assert!(result.is_error);
        assert_eq!(result.content, "Unknown tool: roll_dice");
    }

    #[test]
    fn test_tool_definitions() {
        let tools = PlatformTools::all();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, SEARCH_KNOWLEDGE);
        assert_eq!(tools[0].input_schema["required"][0], "query");
    }
}
