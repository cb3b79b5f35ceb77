//! Shared test helpers for agent and chat tests.

use std::sync::Arc;
use std::sync::Mutex;

use workshop_core::error::{KnowledgeError, ProviderError};
use workshop_core::knowledge::{KnowledgeEntry, KnowledgeSource, ModuleCatalog, WorkshopModule};
use workshop_core::message::{Message, ToolCallRequest};
use workshop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use workshop_core::tool::ToolRegistry;
use workshop_knowledge::KnowledgeStore;

/// A provider that replays scripted responses and records every request.
///
/// Each call to `complete` returns the next response in the queue; once the
/// queue is exhausted the `repeat` response (if any) is returned forever.
/// Panics if neither is available.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    repeat: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns `response` on every call.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            return responses.remove(0);
        }
        match &self.repeat {
            Some(response) => Ok(response.clone()),
            None => panic!(
                "ScriptedProvider: no more responses (call #{})",
                self.requests.lock().unwrap().len()
            ),
        }
    }
}

/// A final-answer response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Some(Message::assistant(text)),
        usage: Some(serde_json::json!({
            "prompt_tokens": 10,
            "completion_tokens": 5,
            "total_tokens": 15
        })),
        raw: serde_json::json!({"choices": [{"message": {"role": "assistant", "content": text}}]}),
    }
}

/// A response requesting tool calls.
pub fn make_tool_call_response(tool_calls: Vec<ToolCallRequest>) -> ProviderResponse {
    ProviderResponse {
        message: Some(Message::assistant_with_tool_calls("", tool_calls)),
        usage: None,
        raw: serde_json::Value::Null,
    }
}

/// A response with no choices at all.
pub fn make_empty_response() -> ProviderResponse {
    ProviderResponse {
        message: None,
        usage: None,
        raw: serde_json::json!({"choices": []}),
    }
}

/// Create a tool call request with id `call_{name}`.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(format!("call_{name}"), name, args.to_string())
}

/// A static module listing.
pub struct FixedModules(pub Vec<WorkshopModule>);

#[async_trait::async_trait]
impl ModuleCatalog for FixedModules {
    async fn list_modules(&self) -> Result<Vec<WorkshopModule>, KnowledgeError> {
        Ok(self.0.clone())
    }

    async fn read_module(&self, slug: &str) -> Result<String, KnowledgeError> {
        Err(KnowledgeError::ModuleNotFound(slug.to_string()))
    }
}

pub fn sample_knowledge() -> Arc<dyn KnowledgeSource> {
    Arc::new(KnowledgeStore::from_entries(vec![KnowledgeEntry {
        id: "a".into(),
        title: "Debugging".into(),
        content: "Check the logs first. Then reproduce the bug.".into(),
    }]))
}

pub fn sample_modules() -> Arc<dyn ModuleCatalog> {
    Arc::new(FixedModules(vec![WorkshopModule {
        slug: "01-intro".into(),
        heading: Some("Intro".into()),
        summary: "Welcome.".into(),
    }]))
}

/// The production registry over the sample data.
pub fn sample_registry() -> Arc<ToolRegistry> {
    Arc::new(workshop_tools::default_registry(sample_knowledge(), sample_modules()).unwrap())
}
