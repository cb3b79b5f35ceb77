//! HTTP error bodies.
//!
//! Domain errors are mapped to a status and a JSON body here and nowhere else.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

use workshop_core::error::{AgentError, ChatError, KnowledgeError, ProviderError};

/// The operation an upstream call was made for, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Agent,
    Chat,
    Image,
}

impl Upstream {
    fn as_str(self) -> &'static str {
        match self {
            Upstream::Agent => "agent",
            Upstream::Chat => "chat",
            Upstream::Image => "image",
        }
    }
}

/// An error response: `{error, status?, stage?, details?}` with an HTTP status.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub http_status: StatusCode,

    pub error: String,

    /// The upstream endpoint's status, when it answered with a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(http_status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            http_status,
            error: error.into(),
            status: None,
            stage: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn with_stage(mut self, stage: &'static str) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn invalid_payload(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request payload").with_details(details)
    }

    /// Map a body extraction failure. Oversized bodies keep their 413.
    pub fn from_rejection(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text());
        }
        Self::invalid_payload(rejection.body_text())
    }

    pub fn provider(upstream: Upstream, err: ProviderError) -> Self {
        let kind = upstream.as_str();
        match err {
            ProviderError::ApiError { status_code, message } => {
                let http_status =
                    StatusCode::from_u16(status_code).unwrap_or(StatusCode::BAD_GATEWAY);
                Self {
                    status: Some(status_code),
                    ..Self::new(http_status, format!("Azure OpenAI {kind} request failed"))
                        .with_details(message)
                }
            }
            ProviderError::Network(details) => Self::new(
                StatusCode::BAD_GATEWAY,
                format!("Unable to reach Azure OpenAI {kind} endpoint"),
            )
            .with_details(details),
            ProviderError::Decode(details) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Azure OpenAI {kind} response could not be decoded"),
            )
            .with_details(details),
            ProviderError::NotConfigured(details) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, details)
            }
            ProviderError::Authentication(details) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unable to authenticate with Azure OpenAI {kind} endpoint"),
            )
            .with_details(details),
        }
    }

    pub fn knowledge(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::ModuleNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "Module not found")
            }
            KnowledgeError::ModulesUnavailable { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Unable to load workshop modules")
                    .with_details(err.to_string())
            }
            KnowledgeError::DataUnavailable { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Knowledge base unavailable")
                    .with_details(err.to_string())
            }
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let stage = err.stage();
        let mapped = match err {
            AgentError::Provider(e) => ApiError::provider(Upstream::Agent, e),
            AgentError::MissingMessage => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Azure OpenAI agent response did not include a message",
            ),
            AgentError::Tool(e) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Agent tool dispatch failed")
                    .with_details(e.to_string())
            }
            e @ AgentError::IterationBudgetExceeded { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Agent exceeded maximum number of tool iterations",
            )
            .with_details(e.to_string()),
        };
        mapped.with_stage(stage)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Provider(e) => ApiError::provider(Upstream::Chat, e),
            ChatError::Knowledge(e) => ApiError::knowledge(e),
            ChatError::ReasoningNotConfigured => ApiError::new(
                StatusCode::BAD_REQUEST,
                "Reasoning toggle is enabled but AZURE_OPENAI_REASONING_DEPLOYMENT is not set.",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.http_status.is_server_error() {
            error!(
                status = self.http_status.as_u16(),
                stage = self.stage,
                error = %self.error,
                "Request failed"
            );
        }
        (self.http_status, Json(self)).into_response()
    }
}
