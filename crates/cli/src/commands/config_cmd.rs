//! `workshop-portal config`: print a default configuration file.

use workshop_config::AppConfig;

pub fn run() {
    println!("# Save as workshop-portal.toml, or point WORKSHOP_PORTAL_CONFIG at it.");
    println!("# AZURE_OPENAI_* and WORKSHOP_PORTAL_PASSWORD override these values.");
    println!("{}", AppConfig::default_toml());
}

