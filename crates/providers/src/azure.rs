//! Azure OpenAI deployment client.
//!
//! One instance talks to one deployment:
//! - Chat completions with function calling (`complete`)
//! - Image generation (`generate_image`)
//!
//! Requests carry either an `api-key` header or a managed identity bearer
//! token, falling back to the key when the token cannot be had.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use workshop_config::DeploymentTarget;

use crate::credential::{COGNITIVE_SERVICES_SCOPE, TokenCredential};
use workshop_core::error::ProviderError;
use workshop_core::message::{Message, ToolCallRequest};
use workshop_core::provider::*;

/// How requests to a deployment are authenticated.
#[derive(Clone)]
pub enum AzureAuth {
    ApiKey(String),
    ManagedIdentity {
        credential: Arc<dyn TokenCredential>,
        fallback_key: Option<String>,
    },
}

impl AzureAuth {
    /// An API key alone, unless a managed identity is preferred or there is
    /// no key to send.
    pub fn resolve(
        api_key: Option<String>,
        use_managed_identity: bool,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        match api_key {
            Some(key) if !use_managed_identity => Self::ApiKey(key),
            fallback_key => Self::ManagedIdentity {
                credential,
                fallback_key,
            },
        }
    }

    /// A short label for logs and diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api-key",
            Self::ManagedIdentity {
                fallback_key: Some(_),
                ..
            } => "managed identity (api-key fallback)",
            Self::ManagedIdentity { .. } => "managed identity",
        }
    }

    async fn apply(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ProviderError> {
        let (credential, fallback_key) = match self {
            Self::ApiKey(key) => return Ok(request.header("api-key", key)),
            Self::ManagedIdentity {
                credential,
                fallback_key,
            } => (credential, fallback_key),
        };

        match credential.get_token(COGNITIVE_SERVICES_SCOPE).await {
            Ok(token) => Ok(request.bearer_auth(token)),
            Err(e) => match fallback_key {
                Some(key) => {
                    warn!(error = %e, "Managed identity failed; falling back to API key");
                    Ok(request.header("api-key", key))
                }
                None => Err(ProviderError::Authentication(format!(
                    "No Azure OpenAI authentication method available. Provide \
                     AZURE_OPENAI_API_KEY or enable managed identity. {e}"
                ))),
            },
        }
    }
}

pub struct AzureOpenAiProvider {
    target: DeploymentTarget,
    auth: AzureAuth,
    include_reasoning_param: bool,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    pub fn new(target: DeploymentTarget, auth: AzureAuth, client: reqwest::Client) -> Self {
        Self {
            target,
            auth,
            include_reasoning_param: false,
            client,
        }
    }

    /// Send `reasoning: {effort}` when a request carries reasoning options.
    pub fn with_reasoning_param(mut self, include: bool) -> Self {
        self.include_reasoning_param = include;
        self
    }

    fn url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.target.endpoint,
            urlencoding::encode(&self.target.deployment),
            operation,
            urlencoding::encode(&self.target.api_version),
        )
    }

    /// Build the chat-completions JSON body for a request.
    pub fn build_chat_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": to_api_messages(&request.messages),
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(&request.tools));
        }

        if let Some(reasoning) = request.reasoning {
            if self.include_reasoning_param {
                body["reasoning"] = serde_json::json!({
                    "effort": reasoning.effort.unwrap_or_default(),
                });
            }
            if let Some(max_output_tokens) = reasoning.max_output_tokens {
                body["max_output_tokens"] = serde_json::json!(max_output_tokens);
            }
        }

        body
    }

    /// POST a JSON body and return the decoded response body.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        let response = self
            .auth
            .apply(request)
            .await?
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            warn!(
                deployment = %self.target.deployment,
                status = status.as_u16(),
                body = %text,
                "Azure OpenAI returned error"
            );
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        &self.target.deployment
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = self.url("chat/completions");
        let body = self.build_chat_body(&request);

        debug!(
            deployment = %self.target.deployment,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion request"
        );

        let raw = self.post_json(&url, &body).await?;
        let api_response: ApiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let message = api_response
            .choices
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|m| {
                let tool_calls: Vec<ToolCallRequest> = m
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
                    .collect();
                Message::assistant_with_tool_calls(m.content.unwrap_or_default(), tool_calls)
            });

        Ok(ProviderResponse {
            message,
            usage: api_response.usage,
            raw,
        })
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError> {
        let url = self.url("images/generations");
        let body = serde_json::json!({
            "prompt": request.prompt,
            "size": request.size,
            "n": request.n,
            "style": request.style,
            "quality": request.quality,
            "response_format": request.response_format,
        });

        debug!(
            deployment = %self.target.deployment,
            n = request.n,
            "Sending image generation request"
        );

        let raw = self.post_json(&url, &body).await?;
        let first = raw["data"].get(0);
        let field = |name: &str| {
            first
                .and_then(|d| d.get(name))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Ok(ImageResponse {
            image_base64: field("b64_json"),
            image_url: field("url"),
            raw,
        })
    }
}

// --- Azure OpenAI wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Option<Vec<ApiChoice>>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}
