//! The bounded tool-calling loop.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use workshop_core::error::AgentError;
use workshop_core::message::{Conversation, Message};
use workshop_core::provider::{Provider, ProviderRequest, SamplingParams};
use workshop_core::tool::{ToolExecution, ToolRegistry};

/// Round trips allowed before a run is abandoned.
pub const DEFAULT_MAX_ITERATIONS: u32 = 4;

/// The outcome of one successful agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// The final answer text
    pub message: String,

    /// Usage metadata from the final round trip
    pub usage: Option<serde_json::Value>,

    /// Every tool call made, in dispatch order
    pub tool_executions: Vec<ToolExecution>,

    /// Round trips made, including the final one
    pub iterations: u32,

    /// The full message sequence, ending with the final answer
    pub conversation: Conversation,
}

/// Orchestrates round trips to the chat endpoint and tool dispatch.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of round trips.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the loop until the model answers without tool calls.
    ///
    /// Each iteration sends the whole conversation plus the tool schema. Tool
    /// calls are dispatched one at a time in the order the model issued them,
    /// and each result is appended as a tool message before the next round
    /// trip. Endpoint failures, a response without a message, a failing data
    /// source and budget exhaustion all abort the run.
    pub async fn run(
        &self,
        conversation: Conversation,
        sampling: SamplingParams,
    ) -> Result<AgentRun, AgentError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("agent_run", %run_id, provider = %self.provider.name());
        self.run_inner(conversation, sampling).instrument(span).await
    }

    async fn run_inner(
        &self,
        mut conversation: Conversation,
        sampling: SamplingParams,
    ) -> Result<AgentRun, AgentError> {
        info!(messages = conversation.len(), "Starting agent run");

        let tool_definitions = self.tools.definitions();
        let mut tool_executions = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, messages = conversation.len(), "Agent loop iteration");

            let request = ProviderRequest::new(conversation.messages().to_vec(), sampling)
                .with_tools(tool_definitions.clone());
            let response = self.provider.complete(request).await.inspect_err(|e| {
                warn!(iteration, error = %e, "Endpoint call failed");
            })?;

            let Some(message) = response.message else {
                warn!(iteration, "Endpoint response did not include a message");
                return Err(AgentError::MissingMessage);
            };

            if !message.has_tool_calls() {
                conversation.push(Message::assistant(message.content.clone()));
                info!(
                    iterations = iteration,
                    tool_calls = tool_executions.len(),
                    "Agent run finished"
                );
                return Ok(AgentRun {
                    message: message.content,
                    usage: response.usage,
                    tool_executions,
                    iterations: iteration,
                    conversation,
                });
            }

            debug!(iteration, tool_count = message.tool_calls.len(), "Executing tool calls");

            let tool_calls = message.tool_calls.clone();
            conversation.push(Message::assistant_with_tool_calls(
                message.content,
                tool_calls.clone(),
            ));

            for call in &tool_calls {
                let execution = self.tools.execute(call).await.inspect_err(|e| {
                    warn!(
                        tool = %call.name,
                        call_id = %call.id,
                        error = %e,
                        "Tool dispatch failed"
                    );
                })?;
                conversation.push(Message::tool_result(&call.id, execution.output.to_content()));
                tool_executions.push(execution);
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Agent exceeded maximum number of tool iterations"
        );
        Err(AgentError::IterationBudgetExceeded {
            max_iterations: self.max_iterations,
        })
    }
}

/// Assemble the initial conversation for one run.
///
/// An empty system prompt is omitted.
pub fn build_conversation(
    system_prompt: Option<&str>,
    history: impl IntoIterator<Item = Message>,
    prompt: &str,
) -> Conversation {
    let mut conversation = Conversation::new();
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        conversation.push(Message::system(system));
    }
    for message in history {
        conversation.push(message);
    }
    conversation.push(Message::user(prompt));
    conversation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use workshop_core::error::{KnowledgeError, ProviderError, ToolError};
    use workshop_core::message::{Role, ToolCallRequest};
    use workshop_core::tool::ToolOutput;
    use workshop_knowledge::KnowledgeStore;

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        AgentLoop::new(provider, sample_registry())
    }

    fn conversation(prompt: &str) -> Conversation {
        build_conversation(Some("You are a workshop assistant."), Vec::new(), prompt)
    }

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(ScriptedProvider::new(vec![make_text_response("Hello!")]));
        let run = agent(provider.clone())
            .run(conversation("Hi"), SamplingParams::default())
            .await
            .unwrap();

        assert_eq!(run.message, "Hello!");
        assert!(run.tool_executions.is_empty());
        assert_eq!(run.iterations, 1);
        assert_eq!(run.usage.unwrap()["total_tokens"], 15);
        // System + User + Assistant
        assert_eq!(run.conversation.len(), 3);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![make_tool_call(
                "knowledge_lookup",
                serde_json::json!({"query": "logs"}),
            )]),
            make_text_response("Check the logs first."),
        ]));

        let run = agent(provider.clone())
            .run(conversation("How do I debug?"), SamplingParams::default())
            .await
            .unwrap();

        assert_eq!(run.tool_executions.len(), 1);
        assert_eq!(run.message, "Check the logs first.");
        assert_eq!(run.iterations, 2);

        let execution = &run.tool_executions[0];
        assert_eq!(execution.name, "knowledge_lookup");
        match &execution.output {
            ToolOutput::Success(payload) => {
                assert_eq!(payload["snippets"][0]["excerpt"], "Check the logs first.");
            }
            other => panic!("expected success, got {other:?}"),
        }

        // The second round trip carries the tool round.
        let second = &provider.requests()[1];
        let roles: Vec<_> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(second.messages[3].tool_call_id.as_deref(), Some("call_knowledge_lookup"));
        assert_eq!(second.tools.len(), 2);
    }

    #[tokio::test]
    async fn tool_results_follow_issue_order() {
        let calls = vec![
            ToolCallRequest::new("b-2", "list_workshop_modules", ""),
            ToolCallRequest::new("a-1", "knowledge_lookup", r#"{"query":"bug"}"#),
            ToolCallRequest::new("c-3", "not_a_tool", "{}"),
        ];
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(calls),
            make_text_response("done"),
        ]));

        let run = agent(provider)
            .run(conversation("Go"), SamplingParams::default())
            .await
            .unwrap();

        let tool_ids: Vec<_> = run
            .conversation
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tool_ids, ["b-2", "a-1", "c-3"]);

        let names: Vec<_> = run.tool_executions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["list_workshop_modules", "knowledge_lookup", "not_a_tool"]);
        assert!(run.tool_executions[2].output.is_error());
    }

    #[tokio::test]
    async fn recoverable_tool_errors_are_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![ToolCallRequest::new("c1", "knowledge_lookup", "{oops")]),
            make_text_response("Sorry, retrying did not help."),
        ]));

        let run = agent(provider.clone())
            .run(conversation("Q"), SamplingParams::default())
            .await
            .unwrap();

        assert!(run.tool_executions[0].arguments.is_empty());
        let tool_message = &provider.requests()[1].messages[3];
        assert!(tool_message.content.contains("Failed to parse tool arguments"));
    }

    #[tokio::test]
    async fn always_calling_tools_exhausts_budget_after_four_round_trips() {
        let provider = Arc::new(ScriptedProvider::repeating(make_tool_call_response(vec![
            make_tool_call("list_workshop_modules", serde_json::json!({})),
        ])));

        let err = agent(provider.clone())
            .run(conversation("Loop"), SamplingParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::IterationBudgetExceeded { max_iterations: 4 }));
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn custom_budget_is_honored() {
        let provider = Arc::new(ScriptedProvider::repeating(make_tool_call_response(vec![
            make_tool_call("list_workshop_modules", serde_json::json!({})),
        ])));

        let err = agent(provider.clone())
            .with_max_iterations(2)
            .run(conversation("Loop"), SamplingParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "budget");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn missing_message_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![make_empty_response()]));
        let err = agent(provider)
            .run(conversation("Hi"), SamplingParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingMessage));
    }

    #[tokio::test]
    async fn endpoint_failure_aborts_without_retry() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![
            Ok(make_tool_call_response(vec![make_tool_call(
                "list_workshop_modules",
                serde_json::json!({}),
            )])),
            Err(ProviderError::ApiError {
                status_code: 500,
                message: "boom".into(),
            }),
            Ok(make_text_response("never reached")),
        ]));

        let err = agent(provider.clone())
            .run(conversation("Hi"), SamplingParams::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Provider(ProviderError::ApiError { status_code: 500, .. })
        ));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_knowledge_base_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(
            workshop_tools::default_registry(
                Arc::new(KnowledgeStore::new(dir.path().join("knowledge-base.json"))),
                sample_modules(),
            )
            .unwrap(),
        );
        let provider = Arc::new(ScriptedProvider::new(vec![make_tool_call_response(vec![
            make_tool_call("knowledge_lookup", serde_json::json!({"query": "logs"})),
        ])]));

        let err = AgentLoop::new(provider.clone(), tools)
            .run(conversation("Hi"), SamplingParams::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Tool(ToolError::Knowledge(KnowledgeError::DataUnavailable { .. }))
        ));
        assert_eq!(err.stage(), "tool");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn sampling_params_are_forwarded_every_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![make_tool_call(
                "list_workshop_modules",
                serde_json::json!({}),
            )]),
            make_text_response("ok"),
        ]));
        let sampling = SamplingParams {
            temperature: 0.2,
            top_p: 0.5,
        };

        agent(provider.clone())
            .run(conversation("Hi"), sampling)
            .await
            .unwrap();

        assert!(provider.requests().iter().all(|r| r.sampling == sampling));
    }

    #[test]
    fn conversation_layout() {
        let conv = build_conversation(
            Some(""),
            vec![Message::user("earlier"), Message::assistant("reply")],
            "now",
        );
        let roles: Vec<_> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User]);
        assert_eq!(conv.last().unwrap().content, "now");
    }
}
