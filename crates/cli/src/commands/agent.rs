//! `workshop-portal agent`: one agent run from the terminal.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use workshop_agent::{AgentLoop, build_conversation};
use workshop_config::AppConfig;
use workshop_core::knowledge::{KnowledgeSource, ModuleCatalog};
use workshop_core::provider::SamplingParams;
use workshop_core::tool::ToolOutput;
use workshop_knowledge::{KnowledgeStore, WorkshopDirectory};
use workshop_providers::ProviderSet;

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    system: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let providers = ProviderSet::build_from_config(&config)?;
    let provider = match providers.chat {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: the chat deployment is not configured.");
            eprintln!("  {e}");
            eprintln!();
            eprintln!("  Set the AZURE_OPENAI_* environment variables, or add an [azure]");
            eprintln!("  section to the config file (see `workshop-portal config`).");
            eprintln!();
            return Err(e.into());
        }
    };

    let knowledge: Arc<dyn KnowledgeSource> =
        Arc::new(KnowledgeStore::new(&config.portal.knowledge_base_path));
    let modules: Arc<dyn ModuleCatalog> =
        Arc::new(WorkshopDirectory::new(&config.portal.workshop_dir));
    let tools = Arc::new(workshop_tools::default_registry(knowledge, modules)?);

    let agent = AgentLoop::new(provider, tools).with_max_iterations(config.agent.max_iterations);
    let sampling = SamplingParams {
        temperature: config.agent.default_temperature,
        top_p: config.agent.default_top_p,
    };
    let conversation = build_conversation(system.as_deref(), Vec::new(), &message);

    eprint!("  Thinking...");
    let result = agent.run(conversation, sampling).await;
    eprint!("\r              \r");
    let run = result?;
    info!(
        iterations = run.iterations,
        tool_calls = run.tool_executions.len(),
        "Agent run finished"
    );

    for execution in &run.tool_executions {
        let marker = match execution.output {
            ToolOutput::Success(_) => "ok",
            ToolOutput::Error { .. } => "error",
        };
        println!(
            "  [tool] {}({}) -> {marker}",
            execution.name,
            serde_json::Value::Object(execution.arguments.clone())
        );
    }
    if !run.tool_executions.is_empty() {
        println!();
    }
    println!("{}", run.message);

    Ok(())
}
