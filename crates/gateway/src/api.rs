//! AI routes: the tool-calling agent, single-turn chat and image generation.

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::info;

use workshop_agent::{AgentLoop, ChatGateway, ChatTurn, build_conversation};
use workshop_core::knowledge::RetrievedSnippet;
use workshop_core::message::Message;
use workshop_core::provider::{ImageRequest, ReasoningEffort, ReasoningRequest, SamplingParams};
use workshop_core::tool::ToolExecution;

use crate::SharedState;
use crate::error::{ApiError, Upstream};

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/ai/agent", post(agent_handler))
        .route("/api/ai/chat", post(chat_handler))
        .route("/api/ai/image", post(image_handler))
}

// --- Request types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPayload {
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub prompt: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

/// A prior turn supplied by the caller.
#[derive(Debug, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

impl From<HistoryMessage> for Message {
    fn from(turn: HistoryMessage) -> Self {
        match turn.role {
            HistoryRole::User => Message::user(turn.content),
            HistoryRole::Assistant => Message::assistant(turn.content),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub prompt: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<ReasoningPayload>,
    #[serde(default)]
    pub use_knowledge: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningPayload {
    pub enabled: bool,
    #[serde(default)]
    pub effort: Option<ReasoningEffort>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_output_tokens: Option<f64>,
}

/// Numbers may also arrive as numeric strings, as HTML form fields do.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("number out of range")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got {s:?}"))),
        Some(other) => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn check_prompt(prompt: &str) -> Result<(), ApiError> {
    if prompt.is_empty() {
        return Err(ApiError::invalid_payload("prompt: Prompt cannot be empty"));
    }
    Ok(())
}

fn resolve_sampling(
    temperature: Option<f64>,
    top_p: Option<f64>,
    defaults: SamplingParams,
) -> Result<SamplingParams, ApiError> {
    let temperature = temperature.unwrap_or(defaults.temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ApiError::invalid_payload("temperature: must be between 0 and 2"));
    }
    let top_p = top_p.unwrap_or(defaults.top_p);
    if !(0.0..=1.0).contains(&top_p) {
        return Err(ApiError::invalid_payload("topP: must be between 0 and 1"));
    }
    Ok(SamplingParams { temperature, top_p })
}

impl ReasoningPayload {
    /// The reasoning shaping to apply, `None` when the toggle is off.
    fn into_request(self) -> Result<Option<ReasoningRequest>, ApiError> {
        let max_output_tokens = match self.max_output_tokens {
            None => None,
            Some(n) if n >= 1.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Some(n as u32),
            Some(_) => {
                return Err(ApiError::invalid_payload(
                    "reasoning.maxOutputTokens: must be a positive integer",
                ));
            }
        };
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(ReasoningRequest {
            effort: self.effort,
            max_output_tokens,
        }))
    }
}

// --- Response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
    pub tool_executions: Vec<ToolExecution>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
    pub raw: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<RetrievedSnippet>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationResponse {
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    pub raw: serde_json::Value,
}

// --- Handlers ---

/// POST /api/ai/agent
async fn agent_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AgentPayload>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::from_rejection)?;
    check_prompt(&payload.prompt)?;
    let sampling = resolve_sampling(payload.temperature, payload.top_p, state.default_sampling())?;

    let provider = state
        .providers
        .chat
        .clone()
        .map_err(|e| ApiError::provider(Upstream::Agent, e))?;

    let conversation = build_conversation(
        payload.system_prompt.as_deref(),
        payload.history.into_iter().map(Message::from),
        &payload.prompt,
    );

    let run = AgentLoop::new(provider, state.tools.clone())
        .with_max_iterations(state.agent.max_iterations)
        .run(conversation, sampling)
        .await?;

    info!(
        iterations = run.iterations,
        tool_calls = run.tool_executions.len(),
        "Agent request answered"
    );

    Ok(Json(AgentResponse {
        message: run.message,
        usage: run.usage,
        tool_executions: run.tool_executions,
    }))
}

/// POST /api/ai/chat
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::from_rejection)?;
    check_prompt(&payload.prompt)?;
    let sampling = resolve_sampling(payload.temperature, payload.top_p, state.default_sampling())?;
    let reasoning = match payload.reasoning {
        Some(reasoning) => reasoning.into_request()?,
        None => None,
    };

    let chat = state
        .providers
        .chat
        .clone()
        .map_err(|e| ApiError::provider(Upstream::Chat, e))?;

    let mut gateway = ChatGateway::new(chat).with_knowledge(state.knowledge.clone());
    if let Ok(provider) = &state.providers.reasoning {
        gateway = gateway.with_reasoning(provider.clone());
    }

    let reply = gateway
        .send(ChatTurn {
            system_prompt: payload.system_prompt,
            prompt: payload.prompt,
            sampling,
            reasoning,
            use_knowledge: payload.use_knowledge,
        })
        .await?;

    Ok(Json(ChatResponse {
        message: reply.message,
        usage: reply.usage,
        raw: reply.raw,
        snippets: reply.snippets,
    }))
}

/// POST /api/ai/image
async fn image_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<ImageGenerationResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;
    check_prompt(&request.prompt)?;
    if !(1..=4).contains(&request.n) {
        return Err(ApiError::invalid_payload("n: must be between 1 and 4"));
    }

    let provider = state
        .providers
        .image
        .clone()
        .map_err(|e| ApiError::provider(Upstream::Image, e))?;

    let image = provider
        .generate_image(request)
        .await
        .map_err(|e| ApiError::provider(Upstream::Image, e))?;

    if image.image_base64.is_none() && image.image_url.is_none() {
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            "Azure OpenAI response did not include image data",
        ));
    }

    info!(url = image.image_url.is_some(), "Image generated");
    Ok(Json(ImageGenerationResponse {
        image_base64: image.image_base64,
        image_url: image.image_url,
        raw: image.raw,
    }))
}
