//! `workshop-portal doctor`: diagnose configuration gaps.

use std::path::Path;

use workshop_config::{AppConfig, ConfigError, DeploymentTarget};
use workshop_core::knowledge::ModuleCatalog;
use workshop_knowledge::{KnowledgeStore, WorkshopDirectory};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Workshop Portal Doctor");
    println!("======================\n");

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  [ok]   Config loaded");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            return Err(e.into());
        }
    };

    let mut issues = 0;

    if config.has_password() {
        println!("  [ok]   Portal password configured");
    } else {
        println!(
            "  [fail] No portal password: set WORKSHOP_PORTAL_PASSWORD, or every route stays locked"
        );
        issues += 1;
    }

    let deployments = [
        ("Chat", config.azure.chat_target()),
        ("Reasoning", config.azure.reasoning_target()),
        ("Image", config.azure.image_target()),
    ];
    for (kind, target) in deployments {
        if !report_deployment(kind, target) {
            issues += 1;
        }
    }

    let azure = &config.azure;
    match (azure.prefers_managed_identity(), azure.api_key.is_some()) {
        (false, _) => println!("  [ok]   Azure auth: api-key"),
        (true, true) => println!("  [ok]   Azure auth: managed identity, api-key fallback"),
        (true, false) => println!(
            "  [info] Azure auth: managed identity only (set AZURE_OPENAI_API_KEY for a fallback)"
        ),
    }

    let store = KnowledgeStore::new(&config.portal.knowledge_base_path);
    match store.entries().await {
        Ok(entries) => println!("  [ok]   Knowledge base: {} entries", entries.len()),
        Err(e) => {
            println!("  [warn] {e}");
            issues += 1;
        }
    }

    let modules = WorkshopDirectory::new(&config.portal.workshop_dir);
    match modules.list_modules().await {
        Ok(list) => println!("  [ok]   Workshop modules: {}", list.len()),
        Err(e) => {
            println!("  [warn] {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

fn report_deployment(kind: &str, target: Result<DeploymentTarget, ConfigError>) -> bool {
    match target {
        Ok(target) => {
            println!("  [ok]   {kind} deployment: {} at {}", target.deployment, target.endpoint);
            true
        }
        Err(e) => {
            println!("  [warn] {kind} deployment unavailable. {e}");
            false
        }
    }
}
