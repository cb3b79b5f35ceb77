//! # Workshop Core
//!
//! Domain types, traits, and error definitions for the workshop portal.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the knowledge store, the tools, the provider client and the agent
//! loop are written against.
//!
//! ## Layout
//!
//! - [`message`]: conversation messages and model-issued tool call requests
//! - [`provider`]: the remote chat-completion / image-generation contract
//! - [`tool`]: the closed tool set, its registry and dispatch
//! - [`knowledge`]: knowledge entries, snippets and workshop modules
//! - [`error`]: one error enum per bounded context

pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{
    AgentError, ChatError, Error, KnowledgeError, ProviderError, Result, ToolError,
};
pub use knowledge::{
    DEFAULT_MODULE_TITLE, KnowledgeEntry, KnowledgeSource, ModuleCatalog, ModuleListing,
    RetrievedSnippet, WorkshopModule,
};
pub use message::{Conversation, Message, Role, ToolCallRequest};
pub use provider::{
    ImageRequest, ImageResponse, Provider, ProviderRequest, ProviderResponse, ReasoningEffort,
    ReasoningRequest, SamplingParams, ToolDefinition,
};
pub use tool::{Tool, ToolArguments, ToolExecution, ToolName, ToolOutput, ToolRegistry};
