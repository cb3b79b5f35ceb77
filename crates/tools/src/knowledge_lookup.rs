//! Knowledge lookup tool: grounds answers in the workshop knowledge base.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use workshop_core::error::ToolError;
use workshop_core::knowledge::KnowledgeSource;
use workshop_core::tool::{Tool, ToolArguments, ToolName};

pub const DEFAULT_TOP_K: usize = 3;
pub const MAX_TOP_K: usize = 5;

pub struct KnowledgeLookupTool {
    source: Arc<dyn KnowledgeSource>,
}

impl KnowledgeLookupTool {
    pub fn new(source: Arc<dyn KnowledgeSource>) -> Self {
        Self { source }
    }
}

/// Non-numbers fall back to the default; numbers are clamped into
/// `[1, MAX_TOP_K]` and truncated.
fn top_k_argument(arguments: &ToolArguments) -> usize {
    arguments
        .get("topK")
        .and_then(|v| v.as_f64())
        .map_or(DEFAULT_TOP_K, |k| k.clamp(1.0, MAX_TOP_K as f64) as usize)
}

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> ToolName {
        ToolName::KnowledgeLookup
    }

    fn description(&self) -> &str {
        "Retrieve the most relevant snippets from the workshop knowledge base to ground answers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query or question to look up."
                },
                "topK": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_TOP_K,
                    "description": "How many snippets to return (default 3)."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<serde_json::Value, ToolError> {
        let query = arguments.get("query").and_then(|q| q.as_str()).unwrap_or("");
        if query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Missing required query argument.".into()));
        }

        let top_k = top_k_argument(arguments);
        let snippets = self.source.retrieve(query, top_k).await?;
        debug!(query, top_k, hits = snippets.len(), "knowledge_lookup");

        Ok(serde_json::json!({ "snippets": snippets }))
    }
}
