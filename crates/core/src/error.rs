//! Error types for the workshop portal domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.

use std::path::PathBuf;

use thiserror::Error;

use crate::tool::ToolName;

/// The top-level error type for all workshop portal operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Chat errors ---
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Knowledge base unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("Workshop modules unavailable at {path}: {reason}")]
    ModulesUnavailable { path: PathBuf, reason: String },

    #[error("Workshop module not found: {0}")]
    ModuleNotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The model sent arguments the tool cannot act on. Absorbed into a
    /// model-visible error output.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// A backing data source failed. Fatal to the whole run.
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error("No implementation registered for tool {0}")]
    Incomplete(ToolName),
}

/// Fatal outcomes of one agent run.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Endpoint call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Endpoint response did not include a message")]
    MissingMessage,

    #[error("Tool dispatch failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Agent exceeded maximum number of tool iterations ({max_iterations})")]
    IterationBudgetExceeded { max_iterations: u32 },
}

impl AgentError {
    /// The loop stage that failed, for operator-facing error bodies.
    pub fn stage(&self) -> &'static str {
        match self {
            AgentError::Provider(_) => "endpoint",
            AgentError::MissingMessage => "decode",
            AgentError::Tool(_) => "tool",
            AgentError::IterationBudgetExceeded { .. } => "budget",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("Endpoint call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Knowledge injection failed: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Reasoning was requested but no reasoning deployment is configured")]
    ReasoningNotConfigured,
}
