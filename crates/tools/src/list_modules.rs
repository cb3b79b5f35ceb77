//! Workshop module listing tool.

use std::sync::Arc;

use async_trait::async_trait;
use workshop_core::error::ToolError;
use workshop_core::knowledge::ModuleCatalog;
use workshop_core::tool::{Tool, ToolArguments, ToolName};

pub struct ListWorkshopModulesTool {
    catalog: Arc<dyn ModuleCatalog>,
}

impl ListWorkshopModulesTool {
    pub fn new(catalog: Arc<dyn ModuleCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ListWorkshopModulesTool {
    fn name(&self) -> ToolName {
        ToolName::ListWorkshopModules
    }

    fn description(&self) -> &str {
        "List workshop modules with their titles and summaries."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: &ToolArguments) -> Result<serde_json::Value, ToolError> {
        let modules: Vec<_> = self
            .catalog
            .list_modules()
            .await?
            .iter()
            .map(|m| m.listing(&m.slug))
            .collect();
        Ok(serde_json::json!({ "modules": modules }))
    }
}
