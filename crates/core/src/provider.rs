//! Provider trait: the abstraction over the remote model endpoint.
//!
//! A Provider knows how to send a conversation to a hosted chat-completion
//! deployment and get one choice back, and optionally how to generate images.
//!
//! Implementation: Azure OpenAI deployments (`workshop-providers`).

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::ProviderError;
use crate::message::Message;

/// Sampling parameters forwarded verbatim on every round trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature (0.0 = deterministic, 2.0 = most random)
    pub temperature: f64,

    /// Nucleus sampling mass
    pub top_p: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    #[default]
    Medium,
    High,
}

/// Reasoning-mode shaping for a single chat round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReasoningRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One round trip's worth of input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    pub sampling: SamplingParams,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningRequest>,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>, sampling: SamplingParams) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            sampling,
            reasoning: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_reasoning(mut self, reasoning: Option<ReasoningRequest>) -> Self {
        self.reasoning = reasoning;
        self
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The first choice's message, if the endpoint returned one
    pub message: Option<Message>,

    /// Usage metadata, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,

    /// The raw response body
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Vivid,
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageResponseFormat {
    #[default]
    #[serde(rename = "b64_json")]
    Base64Json,
    #[serde(rename = "url")]
    Url,
}

fn default_image_count() -> u8 {
    1
}

/// Whole numbers may also arrive as numeric strings.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let count = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => return Ok(default_image_count()),
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| de::Error::custom("n: expected a whole number of images"))
}

/// An image-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,

    #[serde(default)]
    pub size: ImageSize,

    #[serde(default)]
    pub style: ImageStyle,

    #[serde(default)]
    pub quality: ImageQuality,

    /// Number of images, 1 to 4
    #[serde(default = "default_image_count", deserialize_with = "lenient_count")]
    pub n: u8,

    #[serde(default)]
    pub response_format: ImageResponseFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// The core Provider trait.
///
/// The agent loop and the chat gateway call `complete()` without knowing
/// which deployment sits behind it; tests substitute scripted providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., the deployment name).
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Generate images for a prompt.
    ///
    /// Default implementation returns an error indicating images aren't supported.
    async fn generate_image(&self, _request: ImageRequest) -> Result<ImageResponse, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support image generation",
            self.name()
        )))
    }
}
