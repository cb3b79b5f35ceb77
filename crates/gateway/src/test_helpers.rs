//! Shared fixtures for router tests.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, header};

use workshop_config::AppConfig;
use workshop_core::error::{KnowledgeError, ProviderError};
use workshop_core::knowledge::{KnowledgeEntry, ModuleCatalog, WorkshopModule};
use workshop_core::message::{Message, ToolCallRequest};
use workshop_core::provider::{
    ImageRequest, ImageResponse, Provider, ProviderRequest, ProviderResponse,
};
use workshop_knowledge::{KnowledgeStore, describe_module};
use workshop_providers::ProviderSet;

use crate::auth::{AUTH_COOKIE, hash_password};
use crate::{AppState, SharedState};

pub const TEST_PASSWORD: &str = "secret";

/// Replays scripted completions and images, recording every request.
#[derive(Default)]
pub struct ScriptedProvider {
    completions: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    images: Mutex<Vec<Result<ImageResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    image_requests: Mutex<Vec<ImageRequest>>,
}

impl ScriptedProvider {
    pub fn completing(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            completions: Mutex::new(responses),
            ..Self::default()
        })
    }

    pub fn imaging(responses: Vec<Result<ImageResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            images: Mutex::new(responses),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn image_requests(&self) -> Vec<ImageRequest> {
        self.image_requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len() + self.image_requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.completions.lock().unwrap();
        assert!(!responses.is_empty(), "ScriptedProvider: no more completions");
        responses.remove(0)
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError> {
        self.image_requests.lock().unwrap().push(request);
        let mut responses = self.images.lock().unwrap();
        assert!(!responses.is_empty(), "ScriptedProvider: no more images");
        responses.remove(0)
    }
}

pub fn text_response(text: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        message: Some(Message::assistant(text)),
        usage: Some(serde_json::json!({"total_tokens": 15})),
        raw: serde_json::json!({"id": "chatcmpl-1"}),
    })
}

pub fn tool_call_response(
    name: &str,
    args: serde_json::Value,
) -> Result<ProviderResponse, ProviderError> {
    let call = ToolCallRequest::new(format!("call_{name}"), name, args.to_string());
    Ok(ProviderResponse {
        message: Some(Message::assistant_with_tool_calls("", vec![call])),
        usage: None,
        raw: serde_json::Value::Null,
    })
}

/// Module markdown held in memory, described the same way as files on disk.
pub struct MemoryModules(pub Vec<(&'static str, &'static str)>);

#[async_trait::async_trait]
impl ModuleCatalog for MemoryModules {
    async fn list_modules(&self) -> Result<Vec<WorkshopModule>, KnowledgeError> {
        Ok(self.0.iter().map(|(slug, markdown)| describe_module(slug, markdown)).collect())
    }

    async fn read_module(&self, slug: &str) -> Result<String, KnowledgeError> {
        self.0
            .iter()
            .find(|(s, _)| *s == slug)
            .map(|(_, markdown)| markdown.to_string())
            .ok_or_else(|| KnowledgeError::ModuleNotFound(slug.to_string()))
    }
}

pub fn locked_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.portal.password = Some(TEST_PASSWORD.into());
    config
}

pub fn open_config() -> AppConfig {
    AppConfig::default()
}

pub fn state_from(config: AppConfig, providers: ProviderSet) -> SharedState {
    let knowledge = Arc::new(KnowledgeStore::from_entries(vec![KnowledgeEntry {
        id: "kb-1".into(),
        title: "Debugging".into(),
        content: "Check the logs first. Then reproduce the bug.".into(),
    }]));
    let modules = Arc::new(MemoryModules(vec![
        ("01-intro", "# Introduction\n\nWelcome to the workshop.\n"),
        ("02-agents", "# Agents\nTools and loops.\n"),
    ]));
    Arc::new(AppState::new(&config, providers, knowledge, modules).unwrap())
}

/// State with the test password set.
pub fn test_state(providers: ProviderSet) -> SharedState {
    state_from(locked_config(), providers)
}

pub fn session_cookie_header() -> String {
    format!("{AUTH_COOKIE}={}", hash_password(TEST_PASSWORD))
}

pub fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, session_cookie_header())
        .body(Body::empty())
        .unwrap()
}

pub fn authed_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    authed_post_raw(uri, body.to_string())
}

pub fn authed_post_raw(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, session_cookie_header())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}
