//! Single round-trip chat, optionally in reasoning mode or grounded in the
//! knowledge base.

use std::sync::Arc;

use tracing::{debug, info};
use workshop_core::error::ChatError;
use workshop_core::knowledge::{KnowledgeSource, RetrievedSnippet};
use workshop_core::message::{Conversation, Message};
use workshop_core::provider::{Provider, ProviderRequest, ReasoningRequest, SamplingParams};

/// Snippets injected when a chat turn asks for knowledge grounding.
pub const INJECTED_SNIPPETS: usize = 3;

/// One chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub sampling: SamplingParams,

    /// Present when reasoning mode is enabled
    pub reasoning: Option<ReasoningRequest>,

    /// Ground the answer in the knowledge base
    pub use_knowledge: bool,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    /// The first choice's content, empty if the endpoint returned none
    pub message: String,
    pub usage: Option<serde_json::Value>,
    pub raw: serde_json::Value,

    /// Snippets injected into the prompt
    pub snippets: Vec<RetrievedSnippet>,
}

/// Sends single chat turns to the chat or reasoning deployment.
pub struct ChatGateway {
    chat: Arc<dyn Provider>,
    reasoning: Option<Arc<dyn Provider>>,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
}

impl ChatGateway {
    pub fn new(chat: Arc<dyn Provider>) -> Self {
        Self {
            chat,
            reasoning: None,
            knowledge: None,
        }
    }

    pub fn with_reasoning(mut self, provider: Arc<dyn Provider>) -> Self {
        self.reasoning = Some(provider);
        self
    }

    pub fn with_knowledge(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge = Some(source);
        self
    }

    pub async fn send(&self, turn: ChatTurn) -> Result<ChatReply, ChatError> {
        let provider = match turn.reasoning {
            Some(_) => self.reasoning.clone().ok_or(ChatError::ReasoningNotConfigured)?,
            None => self.chat.clone(),
        };

        let snippets = match (&self.knowledge, turn.use_knowledge) {
            (Some(source), true) => source.retrieve(&turn.prompt, INJECTED_SNIPPETS).await?,
            _ => Vec::new(),
        };

        let mut conversation = Conversation::new();
        if let Some(system) = turn.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            conversation.push(Message::system(system));
        }
        if !snippets.is_empty() {
            conversation.push(Message::system(knowledge_context(&snippets)));
        }
        conversation.push(Message::user(turn.prompt));

        debug!(
            provider = %provider.name(),
            reasoning = turn.reasoning.is_some(),
            snippets = snippets.len(),
            "Sending chat turn"
        );

        let request = ProviderRequest::new(conversation.messages().to_vec(), turn.sampling)
            .with_reasoning(turn.reasoning);
        let response = provider.complete(request).await?;

        let message = response.message.map(|m| m.content).unwrap_or_default();
        info!(provider = %provider.name(), chars = message.len(), "Chat turn answered");

        Ok(ChatReply {
            message,
            usage: response.usage,
            raw: response.raw,
            snippets,
        })
    }
}

/// The system message listing injected snippets, one `[title] excerpt` line each.
fn knowledge_context(snippets: &[RetrievedSnippet]) -> String {
    let mut context = String::from(
        "Use the following workshop knowledge base excerpts when they are relevant:",
    );
    for snippet in snippets {
        context.push_str(&format!("\n[{}] {}", snippet.entry.title, snippet.excerpt));
    }
    context
}
