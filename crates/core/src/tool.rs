//! Tool trait and registry: the closed set of server-side capabilities.
//!
//! The model may only invoke the tools named by [`ToolName`]. Adding a tool
//! means adding a variant and registering an implementation; dispatch control
//! flow in [`ToolRegistry::execute`] does not change.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ToolCallRequest;
use crate::provider::ToolDefinition;

/// Parsed tool arguments: a JSON object.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// Every tool the portal knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    KnowledgeLookup,
    ListWorkshopModules,
}

impl ToolName {
    /// All tools, in the order their definitions are sent to the model.
    pub const ALL: [ToolName; 2] = [ToolName::KnowledgeLookup, ToolName::ListWorkshopModules];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::KnowledgeLookup => "knowledge_lookup",
            ToolName::ListWorkshopModules => "list_workshop_modules",
        }
    }

    /// Resolve a model-issued tool name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tool call produced.
///
/// Serialized untagged: a success is its payload as-is, an error is
/// `{"error": ..., "details": ...}`. This is exactly what the model sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Success(serde_json::Value),
}

impl ToolOutput {
    pub fn error(message: impl Into<String>) -> Self {
        ToolOutput::Error {
            error: message.into(),
            details: None,
        }
    }

    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        ToolOutput::Error {
            error: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error { .. })
    }

    /// The JSON text appended to the conversation as a tool-role message.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// The record of one tool call, kept for the caller's visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// The tool name exactly as the model issued it
    pub name: String,

    /// Parsed arguments (empty when they failed to parse)
    pub arguments: ToolArguments,

    pub output: ToolOutput,
}

/// The core Tool trait.
///
/// Implementations validate their own arguments. Returning
/// [`ToolError::InvalidArguments`] produces a model-visible error output;
/// any other error aborts the agent run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which member of the closed tool set this implements.
    fn name(&self) -> ToolName;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-parsed arguments.
    async fn execute(&self, arguments: &ToolArguments) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The registry of tool implementations, keyed by [`ToolName`].
pub struct ToolRegistry {
    tools: HashMap<ToolName, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: ToolName) -> Option<&dyn Tool> {
        self.tools.get(&name).map(|t| t.as_ref())
    }

    /// Fail unless every [`ToolName`] has an implementation. Called at startup.
    pub fn ensure_complete(&self) -> Result<(), ToolError> {
        match ToolName::ALL.into_iter().find(|name| !self.tools.contains_key(name)) {
            Some(missing) => Err(ToolError::Incomplete(missing)),
            None => Ok(()),
        }
    }

    /// Tool definitions for the model, in [`ToolName::ALL`] order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(|tool| tool.to_definition())
            .collect()
    }

    /// Run one model-issued tool call.
    ///
    /// Argument parse failures, unknown tool names and invalid arguments are
    /// returned as an error *output*. Only infrastructure failures come back
    /// as `Err`.
    pub async fn execute(&self, call: &ToolCallRequest) -> Result<ToolExecution, ToolError> {
        let arguments = match parse_arguments(&call.arguments) {
            Ok(arguments) => arguments,
            Err(details) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    %details,
                    "Failed to parse tool arguments"
                );
                return Ok(ToolExecution {
                    name: call.name.clone(),
                    arguments: ToolArguments::new(),
                    output: ToolOutput::error_with_details(
                        "Failed to parse tool arguments",
                        details,
                    ),
                });
            }
        };

        let Some(tool) = ToolName::parse(&call.name).and_then(|name| self.get(name)) else {
            warn!(tool = %call.name, call_id = %call.id, "Model requested an unknown tool");
            return Ok(ToolExecution {
                output: ToolOutput::error(format!(
                    "Tool {} is not implemented on this server.",
                    call.name
                )),
                name: call.name.clone(),
                arguments,
            });
        };

        debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");

        let output = match tool.execute(&arguments).await {
            Ok(payload) => ToolOutput::Success(payload),
            Err(ToolError::InvalidArguments(message)) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    %message,
                    "Tool rejected its arguments"
                );
                ToolOutput::error(message)
            }
            Err(e) => return Err(e),
        };

        Ok(ToolExecution {
            name: call.name.clone(),
            arguments,
            output,
        })
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<ToolName> {
        ToolName::ALL
            .into_iter()
            .filter(|name| self.tools.contains_key(name))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Empty argument text means "no arguments"; anything else must be a JSON object.
fn parse_arguments(raw: &str) -> Result<ToolArguments, String> {
    if raw.trim().is_empty() {
        return Ok(ToolArguments::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
