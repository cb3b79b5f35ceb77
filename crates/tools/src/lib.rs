//! Server-side tools the workshop assistant can call.
//!
//! Both tools read data only; neither has side effects. They depend on the
//! `KnowledgeSource` and `ModuleCatalog` traits, so any backing store works.

pub mod knowledge_lookup;
pub mod list_modules;

use std::sync::Arc;

use workshop_core::error::ToolError;
use workshop_core::knowledge::{KnowledgeSource, ModuleCatalog};
use workshop_core::tool::ToolRegistry;

pub use knowledge_lookup::KnowledgeLookupTool;
pub use list_modules::ListWorkshopModulesTool;

/// Create the tool registry with every built-in tool.
///
/// Fails if a tool name has no implementation.
pub fn default_registry(
    knowledge: Arc<dyn KnowledgeSource>,
    modules: Arc<dyn ModuleCatalog>,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(KnowledgeLookupTool::new(knowledge)));
    registry.register(Box::new(ListWorkshopModulesTool::new(modules)));
    registry.ensure_complete()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_core::message::ToolCallRequest;
    use workshop_core::tool::ToolOutput;
    use workshop_knowledge::{KnowledgeStore, WorkshopDirectory};

    fn registry(dir: &std::path::Path) -> ToolRegistry {
        default_registry(
            Arc::new(KnowledgeStore::from_entries(Vec::new())),
            Arc::new(WorkshopDirectory::new(dir)),
        )
        .unwrap()
    }

    #[test]
    fn default_registry_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["knowledge_lookup", "list_workshop_modules"]);
    }

    #[tokio::test]
    async fn dispatch_reports_blank_query_as_output() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let call = ToolCallRequest::new("call_1", "knowledge_lookup", r#"{"query":""}"#);
        let execution = registry.execute(&call).await.unwrap();
        assert_eq!(execution.output, ToolOutput::error("Missing required query argument."));
        assert_eq!(execution.arguments["query"], "");
    }

    #[tokio::test]
    async fn dispatch_of_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let call = ToolCallRequest::new("call_1", "knowledge_lookup", r#"{"query":"anything"}"#);
        let execution = registry.execute(&call).await.unwrap();
        assert_eq!(execution.output.to_content(), r#"{"snippets":[]}"#);
    }
}
