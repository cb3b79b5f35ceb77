//! `workshop-portal serve`: start the portal HTTP server.

use std::path::Path;

use tracing::info;
use workshop_config::AppConfig;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Workshop Portal");
    println!("   Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    let password = if config.has_password() {
        "configured"
    } else {
        "NOT SET (portal locked)"
    };
    println!("   Password:   {password}");
    println!("   Knowledge:  {}", config.portal.knowledge_base_path.display());
    println!("   Modules:    {}", config.portal.workshop_dir.display());

    workshop_gateway::start(config).await?;

    info!("Workshop portal stopped");
    Ok(())
}
