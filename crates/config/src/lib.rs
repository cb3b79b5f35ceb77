//! Configuration loading, validation, and management for the workshop portal.
//!
//! Loads configuration from `workshop-portal.toml` (or the file named by
//! `WORKSHOP_PORTAL_CONFIG` / `--config`), applies environment variable
//! overrides, and validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WORKSHOP_PORTAL_CONFIG";

/// Config file used when neither `--config` nor [`CONFIG_PATH_ENV`] is set.
pub const DEFAULT_CONFIG_FILE: &str = "workshop-portal.toml";

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Password gate and content locations
    #[serde(default)]
    pub portal: PortalConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Azure OpenAI deployments
    #[serde(default)]
    pub azure: AzureConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("gateway", &self.gateway)
            .field("portal", &self.portal)
            .field("agent", &self.agent)
            .field("azure", &self.azure)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Shared secret gating every page and API route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_knowledge_base_path")]
    pub knowledge_base_path: PathBuf,

    #[serde(default = "default_workshop_dir")]
    pub workshop_dir: PathBuf,

    /// Mark the auth cookie `Secure` (enable behind TLS)
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_knowledge_base_path() -> PathBuf {
    PathBuf::from("data").join("knowledge-base.json")
}
fn default_workshop_dir() -> PathBuf {
    PathBuf::from("content").join("workshop")
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            password: None,
            knowledge_base_path: default_knowledge_base_path(),
            workshop_dir: default_workshop_dir(),
            secure_cookie: false,
        }
    }
}

impl std::fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalConfig")
            .field("password", &redact(&self.password))
            .field("knowledge_base_path", &self.knowledge_base_path)
            .field("workshop_dir", &self.workshop_dir)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Round trips allowed per agent run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default = "default_top_p")]
    pub default_top_p: f64,
}

fn default_max_iterations() -> u32 {
    4
}
fn default_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.9
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            default_temperature: default_temperature(),
            default_top_p: default_top_p(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_deployment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_deployment: Option<String>,

    /// Authenticate with a managed identity token, keeping `api_key` as fallback
    #[serde(default)]
    pub use_managed_identity: bool,

    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("api_version", &self.api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("image_deployment", &self.image_deployment)
            .field("use_managed_identity", &self.use_managed_identity)
            .field("reasoning", &self.reasoning)
            .finish()
    }
}

/// A separate deployment used when a chat request enables reasoning.
///
/// Unset fields fall back to the main `[azure]` values.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Send `reasoning: {effort}` in the request body
    #[serde(default)]
    pub include_reasoning_param: bool,
}

impl std::fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("deployment", &self.deployment)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("api_key", &redact(&self.api_key))
            .field("include_reasoning_param", &self.include_reasoning_param)
            .finish()
    }
}

/// Fully resolved settings for one deployment.
///
/// The API key is optional: without one the deployment is reached with a
/// managed identity token.
#[derive(Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentTarget")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl AzureConfig {
    /// Whether requests try a managed identity token before any API key.
    ///
    /// Without an API key there is nothing else to try.
    pub fn prefers_managed_identity(&self) -> bool {
        self.use_managed_identity || self.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
    }

    /// The chat deployment used by the agent loop and plain chat.
    pub fn chat_target(&self) -> Result<DeploymentTarget, ConfigError> {
        resolve_target(
            (self.endpoint.as_ref(), "AZURE_OPENAI_ENDPOINT"),
            (self.chat_deployment.as_ref(), "AZURE_OPENAI_CHAT_DEPLOYMENT"),
            (self.api_version.as_ref(), "AZURE_OPENAI_API_VERSION"),
            self.api_key.as_ref(),
        )
    }

    pub fn image_target(&self) -> Result<DeploymentTarget, ConfigError> {
        resolve_target(
            (self.endpoint.as_ref(), "AZURE_OPENAI_ENDPOINT"),
            (self.image_deployment.as_ref(), "AZURE_OPENAI_IMAGE_DEPLOYMENT"),
            (self.api_version.as_ref(), "AZURE_OPENAI_API_VERSION"),
            self.api_key.as_ref(),
        )
    }

    pub fn reasoning_target(&self) -> Result<DeploymentTarget, ConfigError> {
        let r = &self.reasoning;
        resolve_target(
            (r.endpoint.as_ref().or(self.endpoint.as_ref()), "AZURE_OPENAI_REASONING_ENDPOINT"),
            (r.deployment.as_ref(), "AZURE_OPENAI_REASONING_DEPLOYMENT"),
            (
                r.api_version.as_ref().or(self.api_version.as_ref()),
                "AZURE_OPENAI_REASONING_API_VERSION",
            ),
            r.api_key.as_ref().or(self.api_key.as_ref()),
        )
    }
}

type Setting<'a> = (Option<&'a String>, &'static str);

fn resolve_target(
    endpoint: Setting<'_>,
    deployment: Setting<'_>,
    api_version: Setting<'_>,
    api_key: Option<&String>,
) -> Result<DeploymentTarget, ConfigError> {
    let missing: Vec<&'static str> = [endpoint, deployment, api_version]
        .iter()
        .filter(|(value, _)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(_, name)| *name)
        .collect();

    match (endpoint.0, deployment.0, api_version.0) {
        (Some(endpoint), Some(deployment), Some(api_version)) if missing.is_empty() => {
            Ok(DeploymentTarget {
                endpoint: endpoint.trim().trim_end_matches('/').to_string(),
                deployment: deployment.trim().to_string(),
                api_version: api_version.trim().to_string(),
                api_key: api_key
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty()),
            })
        }
        _ => Err(ConfigError::MissingSettings(missing.join(", "))),
    }
}

impl AppConfig {
    /// Load configuration: file (explicit path, `WORKSHOP_PORTAL_CONFIG`, or
    /// `./workshop-portal.toml`), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides. Blank values count as unset.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let azure = &mut self.azure;
        for (key, slot) in [
            ("AZURE_OPENAI_ENDPOINT", &mut azure.endpoint),
            ("AZURE_OPENAI_API_KEY", &mut azure.api_key),
            ("AZURE_OPENAI_API_VERSION", &mut azure.api_version),
            ("AZURE_OPENAI_CHAT_DEPLOYMENT", &mut azure.chat_deployment),
            ("AZURE_OPENAI_IMAGE_DEPLOYMENT", &mut azure.image_deployment),
            ("AZURE_OPENAI_REASONING_DEPLOYMENT", &mut azure.reasoning.deployment),
            ("AZURE_OPENAI_REASONING_ENDPOINT", &mut azure.reasoning.endpoint),
            ("AZURE_OPENAI_REASONING_API_VERSION", &mut azure.reasoning.api_version),
            ("AZURE_OPENAI_REASONING_API_KEY", &mut azure.reasoning.api_key),
        ] {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }

        if let Some(flag) = get("AZURE_OPENAI_USE_MANAGED_IDENTITY") {
            azure.use_managed_identity = flag.trim().eq_ignore_ascii_case("true");
        }

        if let Some(flag) = get("AZURE_OPENAI_REASONING_INCLUDE_REASONING_PARAM") {
            azure.reasoning.include_reasoning_param = flag.trim().eq_ignore_ascii_case("true");
        }

        if let Some(password) = get("WORKSHOP_PORTAL_PASSWORD") {
            self.portal.password = Some(password);
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.agent.default_temperature) {
            return Err(ConfigError::ValidationError(
                "agent.default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.agent.default_top_p) {
            return Err(ConfigError::ValidationError(
                "agent.default_top_p must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Whether the password gate can admit anyone.
    pub fn has_password(&self) -> bool {
        self.portal
            .password
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Azure OpenAI settings are missing: {0}")]
    MissingSettings(String),
}
