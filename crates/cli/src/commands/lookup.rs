//! `workshop-portal lookup`: query the knowledge base from the terminal.

use std::path::Path;

use tracing::debug;
use workshop_config::AppConfig;
use workshop_core::knowledge::KnowledgeSource;
use workshop_knowledge::KnowledgeStore;

pub async fn run(
    config_path: Option<&Path>,
    query: String,
    top_k: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = KnowledgeStore::new(&config.portal.knowledge_base_path);

    let entries = store.entries().await?;
    let snippets = store.retrieve(&query, top_k).await?;
    debug!(query = %query, top_k, matches = snippets.len(), "Knowledge lookup finished");

    println!("Knowledge base: {} ({} entries)", store.path().display(), entries.len());
    println!();

    if snippets.is_empty() {
        println!("  No entries.");
        return Ok(());
    }

    for (rank, snippet) in snippets.iter().enumerate() {
        println!(
            "  {}. [{}] {} (score {})",
            rank + 1,
            snippet.entry.id,
            snippet.entry.title,
            snippet.score
        );
        println!("     {}", snippet.excerpt);
    }

    Ok(())
}
