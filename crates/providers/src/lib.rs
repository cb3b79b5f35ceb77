//! Remote endpoint clients for the workshop portal.
//!
//! All providers implement the `workshop_core::Provider` trait.
//! [`ProviderSet::build_from_config`] wires one client per configured
//! deployment.

pub mod azure;
pub mod credential;

pub use azure::{AzureAuth, AzureOpenAiProvider};
pub use credential::{ManagedIdentityCredential, TokenCredential};

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use workshop_config::{AppConfig, ConfigError, DeploymentTarget};
use workshop_core::error::ProviderError;
use workshop_core::provider::Provider;

/// A deployment slot: the provider, or why there is none.
pub type ProviderSlot = Result<Arc<dyn Provider>, ProviderError>;

/// The deployments the portal can reach.
#[derive(Clone)]
pub struct ProviderSet {
    pub chat: ProviderSlot,
    pub reasoning: ProviderSlot,
    pub image: ProviderSlot,
}

impl ProviderSet {
    /// A set with nothing configured.
    pub fn empty() -> Self {
        let missing = || Err(ProviderError::NotConfigured("no deployment configured".into()));
        Self {
            chat: missing(),
            reasoning: missing(),
            image: missing(),
        }
    }

    pub fn with_chat(mut self, provider: Arc<dyn Provider>) -> Self {
        self.chat = Ok(provider);
        self
    }

    pub fn with_reasoning(mut self, provider: Arc<dyn Provider>) -> Self {
        self.reasoning = Ok(provider);
        self
    }

    pub fn with_image(mut self, provider: Arc<dyn Provider>) -> Self {
        self.image = Ok(provider);
        self
    }

    /// Build one Azure client per deployment named in `config`.
    ///
    /// Deployments with incomplete settings are left empty, and their slot
    /// records the missing settings. The managed identity endpoint is taken
    /// from the process environment.
    pub fn build_from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;
        let credential: Arc<dyn TokenCredential> = Arc::new(ManagedIdentityCredential::from_lookup(
            client.clone(),
            |key| std::env::var(key).ok(),
        ));
        Ok(Self::build_with_credential(config, client, credential))
    }

    /// Like [`build_from_config`](Self::build_from_config), with the HTTP
    /// client and token source supplied.
    pub fn build_with_credential(
        config: &AppConfig,
        client: reqwest::Client,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        let azure = &config.azure;
        let include_param = azure.reasoning.include_reasoning_param;
        let slot = |kind: &str, target: Result<DeploymentTarget, ConfigError>, include: bool| {
            match target {
                Ok(target) => {
                    let auth = AzureAuth::resolve(
                        target.api_key.clone(),
                        azure.use_managed_identity,
                        credential.clone(),
                    );
                    info!(
                        kind,
                        deployment = %target.deployment,
                        auth = auth.describe(),
                        "Azure OpenAI deployment configured"
                    );
                    let provider = AzureOpenAiProvider::new(target, auth, client.clone())
                        .with_reasoning_param(include);
                    Ok(Arc::new(provider) as Arc<dyn Provider>)
                }
                Err(e) => {
                    warn!(kind, error = %e, "Azure OpenAI deployment not configured");
                    Err(ProviderError::NotConfigured(e.to_string()))
                }
            }
        };

        Self {
            chat: slot("chat", azure.chat_target(), false),
            reasoning: slot("reasoning", azure.reasoning_target(), include_param),
            image: slot("image", azure.image_target(), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_core::message::Message;
    use workshop_core::provider::{ProviderRequest, SamplingParams};

    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.azure.endpoint = Some("https://example.openai.azure.com".into());
        config.azure.api_key = Some("k".into());
        config.azure.api_version = Some("2024-06-01".into());
        config.azure.chat_deployment = Some("gpt-4o".into());
        config
    }

    #[test]
    fn builds_only_configured_deployments() {
        let set = ProviderSet::build_from_config(&configured()).unwrap();
        assert_eq!(set.chat.as_ref().map(|p| p.name().to_string()).ok().as_deref(), Some("gpt-4o"));

        match &set.image {
            Err(ProviderError::NotConfigured(message)) => {
                assert!(message.contains("AZURE_OPENAI_IMAGE_DEPLOYMENT"));
            }
            _ => panic!("image deployment should be missing"),
        }
        assert!(set.reasoning.is_err());
    }

    #[test]
    fn reasoning_inherits_main_settings() {
        let mut config = configured();
        config.azure.reasoning.deployment = Some("o3-mini".into());
        let set = ProviderSet::build_from_config(&config).unwrap();
        let name = set.reasoning.as_ref().map(|p| p.name().to_string()).ok();
        assert_eq!(name.as_deref(), Some("o3-mini"));
    }

    #[tokio::test]
    async fn keyless_deployment_uses_managed_identity() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("GET", "/token")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"access_token": "mi-token", "expires_in": 3600}"#)
            .create_async()
            .await;
        let chat = server
            .mock("POST", "/openai/deployments/gpt-4o/chat/completions")
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer mi-token")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
            .create_async()
            .await;

        let mut config = configured();
        config.azure.api_key = None;
        config.azure.endpoint = Some(server.url());
        let client = reqwest::Client::new();
        let credential = Arc::new(ManagedIdentityCredential::imds(
            client.clone(),
            format!("{}/token", server.url()),
        ));
        let set = ProviderSet::build_with_credential(&config, client, credential);
        let provider = set.chat.as_ref().map_err(|e| e.to_string()).unwrap();

        let request = ProviderRequest::new(vec![Message::user("Hi")], SamplingParams::default());
        assert_eq!(provider.complete(request).await.unwrap().message.unwrap().content, "ok");
        token.assert_async().await;
        chat.assert_async().await;
    }

    #[test]
    fn empty_set_has_no_providers() {
        let set = ProviderSet::empty();
        assert!(set.chat.is_err() && set.reasoning.is_err() && set.image.is_err());
    }
}
